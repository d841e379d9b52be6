//! Numeric history log type identifiers.
//!
//! These are the `typeId` values the pump stamps on each history log record.
//! Only the types mirrored to Nightscout are listed here.

pub const TEMP_RATE_ACTIVATED: u32 = 2;
pub const BASAL_RATE_CHANGE: u32 = 3;
pub const ALERT_ACTIVATED: u32 = 4;
pub const ALARM_ACTIVATED: u32 = 5;
pub const PUMPING_SUSPENDED: u32 = 11;
pub const PUMPING_RESUMED: u32 = 12;
pub const ALERT_CLEARED: u32 = 26;
pub const ALARM_CLEARED: u32 = 28;
pub const CARTRIDGE_FILLED: u32 = 33;
pub const EXTENDED_BOLUS: u32 = 59;
pub const CANNULA_FILLED: u32 = 61;
pub const TUBING_FILLED: u32 = 63;
pub const DAILY_BASAL: u32 = 81;
pub const HYPO_MINIMIZER_SUSPEND: u32 = 198;
pub const HYPO_MINIMIZER_RESUME: u32 = 199;
pub const CONTROL_IQ_USER_MODE_CHANGE: u32 = 229;
pub const CGM_ALERT_ACTIVATED: u32 = 256;
pub const CGM_ALERT_CLEARED: u32 = 257;
pub const BASAL_DELIVERY: u32 = 279;
pub const BOLUS_DELIVERY: u32 = 280;
pub const DEXCOM_G7_CGM: u32 = 372;
pub const DEXCOM_G6_CGM: u32 = 399;
pub const CGM_ALERT_ACTIVATED_DEX: u32 = 416;
pub const CGM_ALERT_CLEARED_DEX: u32 = 417;
pub const CGM_ALERT_ACTIVATED_FSL2: u32 = 418;
pub const CGM_ALERT_CLEARED_FSL2: u32 = 419;
