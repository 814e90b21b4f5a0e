//! Shared test utilities for license detection tests.
//!
//! Small in-memory indexes built from `(identifier, expression, text)` triples.

use crate::license_detection::index::{LicenseIndex, build_index};
use crate::license_detection::models::{License, Rule};

/// Build an index from `(identifier, license_expression, text)` triples.
pub fn create_test_index(rules: &[(&str, &str, &str)]) -> LicenseIndex {
    create_test_index_from_rules(
        rules
            .iter()
            .map(|(identifier, expression, text)| Rule::new(*identifier, *expression, *text))
            .collect(),
    )
}

/// Build an index from fully specified rules and no licenses.
pub fn create_test_index_from_rules(rules: Vec<Rule>) -> LicenseIndex {
    build_index(rules, Vec::<License>::new()).expect("test rules should index")
}

/// A false-positive rule without expression.
pub fn false_positive_rule(identifier: &str, text: &str) -> Rule {
    Rule {
        identifier: identifier.to_string(),
        text: text.to_string(),
        is_false_positive: true,
        ..Rule::default()
    }
}

/// Text of the MIT permission grant, long enough for sequence matching.
pub const MIT_GRANT: &str = "Permission is hereby granted, free of charge, to any person obtaining \
a copy of this software and associated documentation files (the \"Software\"), to deal in the \
Software without restriction, including without limitation the rights to use, copy, modify, \
merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit \
persons to whom the Software is furnished to do so, subject to the following conditions.";

/// A short rule text found word for word inside [`REDISTRIBUTION_NOTICE`].
pub const REDISTRIBUTION_PHRASE: &str = "Redistribution and use permitted.";

/// A longer rule containing [`REDISTRIBUTION_PHRASE`].
pub const REDISTRIBUTION_NOTICE: &str = "Redistribution and use permitted in source and binary forms \
provided that the copyright notice is retained and prior written permission is obtained before \
any distribution.";
