//! Component addressing.
//!
//! A device exposes numbered components: zones, buttons, LEDs, sensors. A
//! [`ComponentGroup`] names a set of those numbers and gives each a 1-based
//! index, either as an arithmetic progression or as an explicit list. A
//! [`DeviceClass`] is the ordered set of groups for one device family and
//! resolves a raw component number to a [`Component`].
//!
//! ```
//! use lutron_integration::devices::{ArraySpec, ComponentGroup, DeviceClass};
//!
//! let class = DeviceClass::new(vec![
//!     ComponentGroup::array("ZONE", "Zone Controller", ArraySpec::new(24, 1))?,
//!     ComponentGroup::array("SCENE_LED", "Scene LED", ArraySpec::new(4, 201).with_stride(9))?,
//! ])?;
//! let led = class.resolve(210).unwrap();
//! assert_eq!(led.to_string(), "SCENE_LED/2");
//! # Ok::<(), lutron_integration::Error>(())
//! ```

pub mod catalog;

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

pub use catalog::DeviceFamily;

/// Array-mode addressing: `count` numbers starting at `base`, `stride` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArraySpec {
    /// Number of components.
    pub count: u32,
    /// Component number of index 1.
    pub base: u32,
    /// Distance between consecutive component numbers.
    pub stride: u32,
}

impl ArraySpec {
    /// Creates a contiguous array (stride 1).
    #[must_use]
    pub const fn new(count: u32, base: u32) -> Self {
        Self {
            count,
            base,
            stride: 1,
        }
    }

    /// Sets the stride.
    #[must_use]
    pub const fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    fn last(self) -> Option<u32> {
        self.count
            .checked_sub(1)?
            .checked_mul(self.stride)?
            .checked_add(self.base)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Addressing {
    Array(ArraySpec),
    Arbitrary(Vec<u32>),
}

/// A named set of component numbers addressed by 1-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentGroup {
    name: String,
    description: String,
    addressing: Addressing,
}

impl ComponentGroup {
    /// Creates a group from exactly one of an array spec or an explicit
    /// list of component numbers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidComponentGroup`] if both or neither are given,
    /// the list is empty, or the array is empty, has stride 0 or runs past
    /// `u32::MAX`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        array: Option<ArraySpec>,
        numbers: Option<Vec<u32>>,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| Error::InvalidComponentGroup {
            name: name.clone(),
            reason: reason.to_owned(),
        };

        let addressing = match (array, numbers) {
            (Some(spec), None) => {
                if spec.stride == 0 {
                    return Err(invalid("stride must be positive"));
                }
                if spec.last().is_none() {
                    return Err(invalid("array must be non-empty and fit in u32"));
                }
                Addressing::Array(spec)
            }
            (None, Some(numbers)) => {
                if numbers.is_empty() {
                    return Err(invalid("number list must not be empty"));
                }
                Addressing::Arbitrary(numbers)
            }
            (Some(_), Some(_)) => {
                return Err(invalid("both an array spec and a number list were given"));
            }
            (None, None) => return Err(invalid("an array spec or a number list is required")),
        };

        Ok(Self {
            name,
            description: description.into(),
            addressing,
        })
    }

    /// Creates an array-mode group.
    ///
    /// # Errors
    ///
    /// See [`ComponentGroup::new`].
    pub fn array(
        name: impl Into<String>,
        description: impl Into<String>,
        spec: ArraySpec,
    ) -> Result<Self> {
        Self::new(name, description, Some(spec), None)
    }

    /// Creates an arbitrary-mode group from component numbers in index order.
    ///
    /// # Errors
    ///
    /// See [`ComponentGroup::new`].
    pub fn arbitrary(
        name: impl Into<String>,
        description: impl Into<String>,
        numbers: impl Into<Vec<u32>>,
    ) -> Result<Self> {
        Self::new(name, description, None, Some(numbers.into()))
    }

    // Unchecked constructors for the built-in tables.
    fn fixed_array(name: &str, description: &str, spec: ArraySpec) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            addressing: Addressing::Array(spec),
        }
    }

    fn fixed_list(name: &str, description: &str, numbers: &[u32]) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            addressing: Addressing::Arbitrary(numbers.to_vec()),
        }
    }

    /// Returns the programmer-facing name, e.g. `ZONE`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description without an index, e.g. `Zone Controller`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the array spec of an array-mode group.
    #[must_use]
    pub fn array_spec(&self) -> Option<ArraySpec> {
        match &self.addressing {
            Addressing::Array(spec) => Some(*spec),
            Addressing::Arbitrary(_) => None,
        }
    }

    /// Returns the component numbers of an arbitrary-mode group.
    #[must_use]
    pub fn numbers(&self) -> Option<&[u32]> {
        match &self.addressing {
            Addressing::Array(_) => None,
            Addressing::Arbitrary(numbers) => Some(numbers),
        }
    }

    /// Returns the number of components.
    #[must_use]
    pub fn count(&self) -> u32 {
        match &self.addressing {
            Addressing::Array(spec) => spec.count,
            Addressing::Arbitrary(numbers) => u32::try_from(numbers.len()).unwrap_or(u32::MAX),
        }
    }

    /// Returns the 1-based index of `number` in this group.
    ///
    /// In an arbitrary-mode group listing a number twice, the first
    /// position wins.
    #[must_use]
    pub fn lookup(&self, number: u32) -> Option<u32> {
        match &self.addressing {
            Addressing::Array(spec) => {
                let offset = number.checked_sub(spec.base)?;
                if offset % spec.stride != 0 {
                    return None;
                }
                let position = offset / spec.stride;
                if position < spec.count {
                    Some(position + 1)
                } else {
                    None
                }
            }
            Addressing::Arbitrary(numbers) => {
                let position = numbers.iter().position(|&n| n == number)?;
                u32::try_from(position + 1).ok()
            }
        }
    }

    /// Returns the component number at a 1-based index.
    #[must_use]
    pub fn component_number(&self, index: u32) -> Option<u32> {
        if index == 0 || index > self.count() {
            return None;
        }
        match &self.addressing {
            Addressing::Array(spec) => (index - 1)
                .checked_mul(spec.stride)?
                .checked_add(spec.base),
            Addressing::Arbitrary(numbers) => {
                numbers.get(usize::try_from(index - 1).ok()?).copied()
            }
        }
    }

    /// Returns the component at a 1-based index.
    #[must_use]
    pub fn component(&self, index: u32) -> Option<Component<'_>> {
        let number = self.component_number(index)?;
        Some(Component {
            group: self,
            index,
            number,
        })
    }

    /// Iterates over the components in index order.
    pub fn components(&self) -> impl Iterator<Item = Component<'_>> + '_ {
        (1..=self.count()).filter_map(|index| self.component(index))
    }
}

/// One component of a group: a group, an index and its wire number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component<'a> {
    group: &'a ComponentGroup,
    index: u32,
    number: u32,
}

impl<'a> Component<'a> {
    /// Returns the group.
    #[must_use]
    pub fn group(&self) -> &'a ComponentGroup {
        self.group
    }

    /// Returns the 1-based index within the group.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the component number used on the wire.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns a human-readable description, e.g. `Zone Controller 8`.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} {}", self.group.description, self.index)
    }
}

impl fmt::Display for Component<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group.name, self.index)
    }
}

/// The addressable surface of one device family: groups in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClass {
    groups: Vec<ComponentGroup>,
}

impl DeviceClass {
    /// Creates a device class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceClass`] if two groups share a name.
    pub fn new(groups: Vec<ComponentGroup>) -> Result<Self> {
        let mut names = HashSet::with_capacity(groups.len());
        for group in &groups {
            if !names.insert(group.name.as_str()) {
                return Err(Error::InvalidDeviceClass {
                    reason: format!("duplicate group name {}", group.name),
                });
            }
        }
        Ok(Self { groups })
    }

    fn fixed(groups: Vec<ComponentGroup>) -> Self {
        Self { groups }
    }

    /// Returns the group with the given name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ComponentGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Returns all groups in declared order.
    #[must_use]
    pub fn groups(&self) -> &[ComponentGroup] {
        &self.groups
    }

    /// Resolves a component number to the first group, in declared order,
    /// that contains it.
    #[must_use]
    pub fn resolve(&self, number: u32) -> Option<Component<'_>> {
        self.groups.iter().find_map(|group| {
            let index = group.lookup(number)?;
            Some(Component {
                group,
                index,
                number,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn led_group() -> ComponentGroup {
        ComponentGroup::array("SCENE_LED", "Scene LED", ArraySpec::new(4, 201).with_stride(9))
            .unwrap()
    }

    #[test]
    fn test_array_round_trip() {
        let group = led_group();
        assert_eq!(group.count(), 4);
        for index in 1..=group.count() {
            let number = group.component_number(index).unwrap();
            assert_eq!(group.lookup(number), Some(index));
        }
        assert_eq!(group.component_number(4), Some(228));
    }

    #[test]
    fn test_array_lookup_rejects_outside_progression() {
        let group = led_group();
        assert_eq!(group.lookup(200), None);
        assert_eq!(group.lookup(202), None);
        assert_eq!(group.lookup(237), None);
        assert_eq!(group.lookup(0), None);
        assert_eq!(group.component_number(0), None);
        assert_eq!(group.component_number(5), None);
    }

    #[test]
    fn test_array_lookup_at_u32_max() {
        let group = ComponentGroup::array("ALL", "All", ArraySpec::new(10, 0)).unwrap();
        assert_eq!(group.lookup(u32::MAX), None);

        let top = ComponentGroup::array("TOP", "Top", ArraySpec::new(1, u32::MAX)).unwrap();
        assert_eq!(top.lookup(u32::MAX), Some(1));
        assert_eq!(top.component_number(1), Some(u32::MAX));
    }

    #[test]
    fn test_arbitrary_lookup() {
        let group =
            ComponentGroup::arbitrary("SCENE_BUTTON", "Scene Button", [70, 71, 76, 77]).unwrap();
        assert_eq!(group.count(), 4);
        assert_eq!(group.lookup(76), Some(3));
        assert_eq!(group.lookup(72), None);
        assert_eq!(group.component_number(1), Some(70));
        assert_eq!(group.component_number(5), None);
        assert_eq!(group.numbers(), Some(&[70, 71, 76, 77][..]));
        assert_eq!(group.array_spec(), None);
    }

    #[test]
    fn test_arbitrary_duplicate_takes_first() {
        let group = ComponentGroup::arbitrary("DUP", "Duplicate", [5, 6, 5]).unwrap();
        assert_eq!(group.lookup(5), Some(1));
    }

    #[test]
    fn test_group_requires_exactly_one_mode() {
        let both = ComponentGroup::new("X", "x", Some(ArraySpec::new(1, 1)), Some(vec![1]));
        assert!(matches!(both, Err(Error::InvalidComponentGroup { .. })));

        let neither = ComponentGroup::new("X", "x", None, None);
        assert!(matches!(neither, Err(Error::InvalidComponentGroup { .. })));

        let empty = ComponentGroup::arbitrary("X", "x", Vec::new());
        assert!(matches!(empty, Err(Error::InvalidComponentGroup { .. })));
    }

    #[test]
    fn test_group_rejects_degenerate_arrays() {
        assert!(ComponentGroup::array("X", "x", ArraySpec::new(3, 1).with_stride(0)).is_err());
        assert!(ComponentGroup::array("X", "x", ArraySpec::new(0, 1)).is_err());
        assert!(ComponentGroup::array("X", "x", ArraySpec::new(3, u32::MAX)).is_err());
        assert!(ComponentGroup::array("X", "x", ArraySpec::new(1, u32::MAX)).is_ok());
    }

    #[test]
    fn test_components_iterate_in_order() {
        let group = led_group();
        let numbers: Vec<u32> = group.components().map(|c| c.number()).collect();
        assert_eq!(numbers, vec![201, 210, 219, 228]);

        let second = group.component(2).unwrap();
        assert_eq!(second.to_string(), "SCENE_LED/2");
        assert_eq!(second.description(), "Scene LED 2");
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let class = DeviceClass::new(vec![
            ComponentGroup::array("EVEN", "Even", ArraySpec::new(5, 0).with_stride(2)).unwrap(),
            ComponentGroup::array("ALL", "All", ArraySpec::new(10, 0)).unwrap(),
        ])
        .unwrap();

        let four = class.resolve(4).unwrap();
        assert_eq!(four.group().name(), "EVEN");
        assert_eq!(four.index(), 3);

        let five = class.resolve(5).unwrap();
        assert_eq!(five.group().name(), "ALL");
        assert_eq!(five.index(), 6);

        assert!(class.resolve(10).is_none());
    }

    #[test]
    fn test_class_rejects_duplicate_names() {
        let result = DeviceClass::new(vec![led_group(), led_group()]);
        assert!(matches!(result, Err(Error::InvalidDeviceClass { .. })));
    }

    #[test]
    fn test_class_group_by_name() {
        let class = DeviceClass::new(vec![led_group()]).unwrap();
        assert!(class.group("SCENE_LED").is_some());
        assert!(class.group("ZONE").is_none());
        assert_eq!(class.groups().len(), 1);
    }
}
