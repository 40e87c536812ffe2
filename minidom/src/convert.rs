// Copyright (c) 2020 lumi <lumi@pew.im>
// Copyright (c) 2020 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper trait to let [`crate::ElementBuilder::attr`] accept a variety of
//! value types, dropping the attribute entirely on `None`.

/// Conversion to an (optional) attribute value.
///
/// Returning `None` means the attribute should not be set at all, which is
/// how `Option<T>` values are handled generically.
pub trait IntoAttributeValue {
    /// Turn this value into an attribute value, or `None` if the attribute
    /// should be omitted.
    fn into_attribute_value(self) -> Option<String>;
}

impl IntoAttributeValue for String {
    fn into_attribute_value(self) -> Option<String> {
        Some(self)
    }
}

impl IntoAttributeValue for &str {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.to_owned())
    }
}

impl IntoAttributeValue for &String {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.clone())
    }
}

impl<T: IntoAttributeValue> IntoAttributeValue for Option<T> {
    fn into_attribute_value(self) -> Option<String> {
        self.and_then(IntoAttributeValue::into_attribute_value)
    }
}

macro_rules! impl_into_attribute_value_via_display {
    ($($t:ty),+ $(,)?) => {
        $(
            impl IntoAttributeValue for $t {
                fn into_attribute_value(self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )+
    };
}

impl_into_attribute_value_via_display!(
    bool, u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64,
);
