//! Panel power and backlight hooks
//!
//! Board-specific GPIO / regulator sequencing. The link layer only decides
//! *when* to call these: power-cycling the panel between failed bring-up
//! attempts, and switching everything off on give-up or shutdown.

/// Panel supply and backlight control.
pub trait PanelPower {
    /// Switch the panel supply on.
    fn lcd_on(&mut self);

    /// Switch the panel supply off.
    fn lcd_off(&mut self);

    /// Switch the backlight on.
    fn backlight_on(&mut self);

    /// Switch the backlight off.
    fn backlight_off(&mut self);
}

/// Boards without controllable panel power.
impl PanelPower for () {
    fn lcd_on(&mut self) {}
    fn lcd_off(&mut self) {}
    fn backlight_on(&mut self) {}
    fn backlight_off(&mut self) {}
}
