// Copyright 2024 The Agenix Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Uniform construction of mismatch diagnostics.

use std::fmt::Display;

use crate::error::ValidationError;

/// `"<base>, expected '<expected>' but was '<actual>'"`
pub(crate) fn value_mismatch(
    base: &str,
    expected: impl Display,
    actual: impl Display,
) -> ValidationError {
    ValidationError::new(format!(
        "{}, expected '{}' but was '{}'",
        base, expected, actual
    ))
}

/// `"<base>, expected value to be in collection [..], but was not found"`
pub(crate) fn not_in_collection(base: &str, candidates: &[String]) -> ValidationError {
    ValidationError::new(format!(
        "{}, expected value to be in collection [{}], but was not found",
        base,
        candidates.join(", ")
    ))
}

pub(crate) fn failure(message: impl Into<String>) -> ValidationError {
    ValidationError::new(message)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_value_mismatch_format() {
        let err = value_mismatch("Values not equal for entry '$['a']'", "1", "2");
        assert_eq!(
            err.message(),
            "Values not equal for entry '$['a']', expected '1' but was '2'"
        );
    }

    #[test]
    fn test_not_in_collection_format() {
        let err = not_in_collection(
            "Item at index 1 is missing for entry '$'",
            &["\"A\"".to_string(), "\"B\"".to_string()],
        );
        assert_eq!(
            err.message(),
            "Item at index 1 is missing for entry '$', expected value to be in collection [\"A\", \"B\"], but was not found"
        );
    }
}
