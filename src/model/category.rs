//! Event categories mirrored to the remote service.

use serde::{Deserialize, Serialize};

use super::type_ids::{
    ALARM_ACTIVATED, ALARM_CLEARED, ALERT_ACTIVATED, ALERT_CLEARED, BASAL_DELIVERY,
    BASAL_RATE_CHANGE, BOLUS_DELIVERY, CANNULA_FILLED, CARTRIDGE_FILLED, CGM_ALERT_ACTIVATED,
    CGM_ALERT_ACTIVATED_DEX, CGM_ALERT_ACTIVATED_FSL2, CGM_ALERT_CLEARED, CGM_ALERT_CLEARED_DEX,
    CGM_ALERT_CLEARED_FSL2, CONTROL_IQ_USER_MODE_CHANGE, DAILY_BASAL, DEXCOM_G6_CGM,
    DEXCOM_G7_CGM, EXTENDED_BOLUS, HYPO_MINIMIZER_RESUME, HYPO_MINIMIZER_SUSPEND,
    PUMPING_RESUMED, PUMPING_SUSPENDED, TEMP_RATE_ACTIVATED, TUBING_FILLED,
};

/// One of the ten fixed event classes.
///
/// The declaration order is the dispatch priority order: readings first,
/// then insulin delivery, then annotations, device status last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorCategory {
    CgmReading,
    Bolus,
    Basal,
    BasalSuspension,
    BasalResume,
    Alarm,
    CgmAlert,
    UserMode,
    Cartridge,
    DeviceStatus,
}

impl ProcessorCategory {
    /// All categories in dispatch priority order.
    pub const ALL: [Self; 10] = [
        Self::CgmReading,
        Self::Bolus,
        Self::Basal,
        Self::BasalSuspension,
        Self::BasalResume,
        Self::Alarm,
        Self::CgmAlert,
        Self::UserMode,
        Self::Cartridge,
        Self::DeviceStatus,
    ];

    /// Canonical snake_case name, used in config files and on the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CgmReading => "cgm_reading",
            Self::Bolus => "bolus",
            Self::Basal => "basal",
            Self::BasalSuspension => "basal_suspension",
            Self::BasalResume => "basal_resume",
            Self::Alarm => "alarm",
            Self::CgmAlert => "cgm_alert",
            Self::UserMode => "user_mode",
            Self::Cartridge => "cartridge",
            Self::DeviceStatus => "device_status",
        }
    }

    /// Human-readable name for status output.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::CgmReading => "CGM Readings",
            Self::Bolus => "Bolus",
            Self::Basal => "Basal",
            Self::BasalSuspension => "Basal Suspension",
            Self::BasalResume => "Basal Resume",
            Self::Alarm => "Alarms",
            Self::CgmAlert => "CGM Alerts",
            Self::UserMode => "User Mode",
            Self::Cartridge => "Cartridge",
            Self::DeviceStatus => "Device Status",
        }
    }

    /// History log type ids claimed by this category.
    ///
    /// The sets are disjoint across categories.
    #[must_use]
    pub const fn type_ids(&self) -> &'static [u32] {
        match self {
            Self::CgmReading => &[DEXCOM_G6_CGM, DEXCOM_G7_CGM],
            Self::Bolus => &[BOLUS_DELIVERY, EXTENDED_BOLUS],
            Self::Basal => &[BASAL_DELIVERY, BASAL_RATE_CHANGE, TEMP_RATE_ACTIVATED],
            Self::BasalSuspension => &[PUMPING_SUSPENDED, HYPO_MINIMIZER_SUSPEND],
            Self::BasalResume => &[PUMPING_RESUMED, HYPO_MINIMIZER_RESUME],
            Self::Alarm => &[ALARM_ACTIVATED, ALARM_CLEARED, ALERT_ACTIVATED, ALERT_CLEARED],
            Self::CgmAlert => &[
                CGM_ALERT_ACTIVATED,
                CGM_ALERT_CLEARED,
                CGM_ALERT_ACTIVATED_DEX,
                CGM_ALERT_CLEARED_DEX,
                CGM_ALERT_ACTIVATED_FSL2,
                CGM_ALERT_CLEARED_FSL2,
            ],
            Self::UserMode => &[CONTROL_IQ_USER_MODE_CHANGE],
            Self::Cartridge => &[CARTRIDGE_FILLED, TUBING_FILLED, CANNULA_FILLED],
            Self::DeviceStatus => &[DAILY_BASAL],
        }
    }

    /// Whether this category claims the given type id.
    #[must_use]
    pub fn claims(&self, type_id: u32) -> bool {
        self.type_ids().contains(&type_id)
    }

    /// The category claiming a type id, if any.
    #[must_use]
    pub fn for_type_id(type_id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.claims(type_id))
    }
}

impl std::fmt::Display for ProcessorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessorCategory {
    type Err = String;

    /// Case-insensitive; accepts `CGM_READING`, `cgm_reading` and `cgm-reading`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Unknown category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_ids_are_disjoint() {
        let mut seen = HashSet::new();
        for category in ProcessorCategory::ALL {
            for id in category.type_ids() {
                assert!(seen.insert(*id), "type id {id} claimed twice");
            }
        }
    }

    #[test]
    fn test_priority_order_matches_declaration() {
        let mut sorted = ProcessorCategory::ALL;
        sorted.sort();
        assert_eq!(sorted, ProcessorCategory::ALL);
        assert_eq!(ProcessorCategory::ALL[0], ProcessorCategory::CgmReading);
        assert_eq!(ProcessorCategory::ALL[9], ProcessorCategory::DeviceStatus);
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(
            "CGM_READING".parse::<ProcessorCategory>(),
            Ok(ProcessorCategory::CgmReading)
        );
        assert_eq!(
            "basal-resume".parse::<ProcessorCategory>(),
            Ok(ProcessorCategory::BasalResume)
        );
        assert!("carbs".parse::<ProcessorCategory>().is_err());
    }

    #[test]
    fn test_for_type_id() {
        assert_eq!(
            ProcessorCategory::for_type_id(DEXCOM_G6_CGM),
            Some(ProcessorCategory::CgmReading)
        );
        assert_eq!(
            ProcessorCategory::for_type_id(HYPO_MINIMIZER_SUSPEND),
            Some(ProcessorCategory::BasalSuspension)
        );
        assert_eq!(ProcessorCategory::for_type_id(1), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ProcessorCategory::CgmAlert).unwrap();
        assert_eq!(json, "\"cgm_alert\"");
    }
}
