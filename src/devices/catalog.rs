//! Built-in device classes.

use std::sync::OnceLock;

use super::{ArraySpec, ComponentGroup, DeviceClass};

/// Device families with a built-in component table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Grafik Eye QS lighting controller.
    GrafikEyeQs,
    /// Sivoia QS shade.
    Shade,
}

impl DeviceFamily {
    /// All families, in no particular order.
    pub const ALL: [Self; 2] = [Self::GrafikEyeQs, Self::Shade];

    /// Looks up a family by the `FAMILY` value of a `~DETAILS` line.
    #[must_use]
    pub fn from_family(family: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.family_name() == family)
    }

    /// Returns the `FAMILY` value the gateway reports, e.g. `GRAFIK_EYE(2)`.
    #[must_use]
    pub const fn family_name(self) -> &'static [u8] {
        match self {
            Self::GrafikEyeQs => b"GRAFIK_EYE(2)",
            Self::Shade => b"SHADES(3)",
        }
    }

    /// Returns the component table.
    #[must_use]
    pub fn device_class(self) -> &'static DeviceClass {
        static GRAFIK_EYE_QS: OnceLock<DeviceClass> = OnceLock::new();
        static SHADE: OnceLock<DeviceClass> = OnceLock::new();

        match self {
            Self::GrafikEyeQs => GRAFIK_EYE_QS.get_or_init(grafik_eye_qs),
            Self::Shade => SHADE.get_or_init(shade),
        }
    }
}

fn grafik_eye_qs() -> DeviceClass {
    let array = ComponentGroup::fixed_array;
    let list = ComponentGroup::fixed_list;
    DeviceClass::fixed(vec![
        array("ZONE", "Zone Controller", ArraySpec::new(24, 1)),
        // One button of each kind per shade column.
        list("SHADE_OPEN", "Shade Column Open", &[38, 44, 50]),
        list("SHADE_PRESET", "Shade Column Preset", &[39, 45, 51]),
        list("SHADE_CLOSE", "Shade Column Close", &[40, 46, 56]),
        list("SHADE_LOWER", "Shade Column Lower", &[41, 52, 57]),
        list("SHADE_RAISE", "Shade Column Raise", &[47, 53, 58]),
        list("SCENE_BUTTON", "Scene Button", &[70, 71, 76, 77]),
        list("SCENE_OFF_BUTTON", "Scene Off Button", &[83]),
        list("SCENE_CONTROLLER", "Scene Controller", &[141]),
        list("LOCAL_CCI", "Local CCI", &[163]),
        list("TIMECLOCK_CONTROLLER", "Timeclock Controller", &[166]),
        // LEDs are laid out in columns of nine.
        array("SCENE_LED", "Scene LED", ArraySpec::new(4, 201).with_stride(9)),
        list("SCENE_OFF_LED", "Scene Off LED", &[237]),
        array(
            "SHADE_OPEN_LED",
            "Shade Column Open LED",
            ArraySpec::new(3, 174).with_stride(9),
        ),
        array(
            "SHADE_PRESET_LED",
            "Shade Column Preset LED",
            ArraySpec::new(3, 175).with_stride(9),
        ),
        array(
            "SHADE_CLOSE_LED",
            "Shade Column Close LED",
            ArraySpec::new(3, 211).with_stride(9),
        ),
        array(
            "WIRELESS_OCC_SENSOR",
            "Wireless Occupancy Sensor",
            ArraySpec::new(30, 500),
        ),
        array(
            "ECOSYSTEM_OCC_SENSOR",
            "EcoSystem Ballast Occupancy Sensor",
            ArraySpec::new(64, 700),
        ),
        list("MASTER_RAISE", "Master Raise Button", &[74]),
        list("MASTER_LOWER", "Master Lower Button", &[75]),
        array(
            "ZONE_RAISE",
            "Zone Raise Button",
            ArraySpec::new(8, 36).with_stride(6),
        ),
        array(
            "ZONE_LOWER",
            "Zone Lower Button",
            ArraySpec::new(8, 37).with_stride(6),
        ),
        list("TIMECLOCK_BUTTON", "Timeclock Button", &[68]),
        list("OK_BUTTON", "OK Button", &[69]),
        list("SWITCH_GROUP_BUTTON", "Switch Group Button", &[80]),
    ])
}

fn shade() -> DeviceClass {
    // Component 0 takes a target position as a light level and reports
    // the current position the same way.
    DeviceClass::fixed(vec![ComponentGroup::fixed_list(
        "SHADE",
        "Shade Position",
        &[0],
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_valid() {
        for family in DeviceFamily::ALL {
            let class = family.device_class();
            let groups = class
                .groups()
                .iter()
                .map(|g| {
                    ComponentGroup::new(
                        g.name(),
                        g.description(),
                        g.array_spec(),
                        g.numbers().map(<[u32]>::to_vec),
                    )
                    .unwrap()
                })
                .collect();
            assert_eq!(&DeviceClass::new(groups).unwrap(), class);
        }
    }

    #[test]
    fn test_family_lookup() {
        assert_eq!(
            DeviceFamily::from_family(b"GRAFIK_EYE(2)"),
            Some(DeviceFamily::GrafikEyeQs)
        );
        assert_eq!(DeviceFamily::from_family(b"SHADES(3)"), Some(DeviceFamily::Shade));
        assert_eq!(DeviceFamily::from_family(b"KEYPAD(1)"), None);
    }

    #[test]
    fn test_grafik_eye_resolution() {
        let class = DeviceFamily::GrafikEyeQs.device_class();
        assert_eq!(class.groups().len(), 25);

        let resolved = |number| class.resolve(number).map(|c| c.to_string());
        assert_eq!(resolved(1).as_deref(), Some("ZONE/1"));
        assert_eq!(resolved(24).as_deref(), Some("ZONE/24"));
        assert_eq!(resolved(56).as_deref(), Some("SHADE_CLOSE/3"));
        assert_eq!(resolved(219).as_deref(), Some("SCENE_LED/3"));
        assert_eq!(resolved(192).as_deref(), Some("SHADE_OPEN_LED/3"));
        assert_eq!(resolved(529).as_deref(), Some("WIRELESS_OCC_SENSOR/30"));
        assert_eq!(resolved(763).as_deref(), Some("ECOSYSTEM_OCC_SENSOR/64"));
        assert_eq!(resolved(78).as_deref(), Some("ZONE_RAISE/8"));
        assert_eq!(resolved(79).as_deref(), Some("ZONE_LOWER/8"));
        assert_eq!(resolved(141).as_deref(), Some("SCENE_CONTROLLER/1"));
        assert_eq!(resolved(0), None);
        assert_eq!(resolved(1000), None);
    }

    #[test]
    fn test_grafik_eye_numbers_are_unique() {
        let class = DeviceFamily::GrafikEyeQs.device_class();
        for group in class.groups() {
            for component in group.components() {
                let resolved = class.resolve(component.number()).unwrap();
                assert_eq!(resolved, component, "{component} is shadowed");
            }
        }
    }

    #[test]
    fn test_shade_position_component() {
        let class = DeviceFamily::Shade.device_class();
        let position = class.resolve(0).unwrap();
        assert_eq!(position.to_string(), "SHADE/1");
        assert_eq!(class.resolve(1), None);
    }
}
