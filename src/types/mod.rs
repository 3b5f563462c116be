//! Core types shared by the registry, attribute store and protocol layer

/// Declares a wire-valued enum with `TryFrom<u32>`, `as_u32` and `ALL`.
///
/// Discriminants start at 1; 0 is reserved as "unspecified" on the wire and
/// is rejected like any other out-of-range value.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $what:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every value, in wire order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire value
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self as u32
            }

            /// Human readable name
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = crate::error::DpllError;

            fn try_from(value: u32) -> ::core::result::Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(crate::error::DpllError::InvalidArgument {
                        name: $what.to_string(),
                        message: format!("value {other} out of range"),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Declares a `u32` bitset over a wire enum, one bit per wire value.
macro_rules! enum_set {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($member:ty);) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name(u32);

        impl $name {
            /// Empty set
            pub const EMPTY: Self = Self(0);

            /// Build a set from members
            #[must_use]
            pub fn from_slice(members: &[$member]) -> Self {
                let mut set = Self::EMPTY;
                for m in members {
                    set.insert(*m);
                }
                set
            }

            /// Add a member
            pub fn insert(&mut self, member: $member) {
                self.0 |= 1 << member.as_u32();
            }

            /// Remove a member
            pub fn remove(&mut self, member: $member) {
                self.0 &= !(1 << member.as_u32());
            }

            /// Membership test
            #[must_use]
            pub fn contains(self, member: $member) -> bool {
                self.0 & (1 << member.as_u32()) != 0
            }

            /// True if no member is set
            #[must_use]
            pub fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if every member of `other` is also in `self`
            #[must_use]
            pub fn is_superset(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Raw bit representation
            #[must_use]
            pub fn bits(self) -> u32 {
                self.0
            }

            /// Members in wire order
            pub fn iter(self) -> impl Iterator<Item = $member> {
                <$member>::ALL.iter().copied().filter(move |m| self.contains(*m))
            }
        }

        impl FromIterator<$member> for $name {
            fn from_iter<I: IntoIterator<Item = $member>>(iter: I) -> Self {
                let mut set = Self::EMPTY;
                for m in iter {
                    set.insert(m);
                }
                set
            }
        }
    };
}

pub(crate) use enum_set;
pub(crate) use wire_enum;

mod config;
mod device;
mod pin;


pub use config::{RegistryConfig, RegistryConfigBuilder};
pub use device::{DeviceClass, DeviceId, DeviceIdentity, DeviceInfo, LockStatus, Mode, ModeSet};
pub use pin::{
    PIN_PRIO_HIGHEST, PIN_PRIO_LOWEST, PinCaps, PinDirection, PinId, PinInfo, PinProperties,
    PinState, PinStateSet, PinType, SignalType, SignalTypeSet,
};
