// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

/// Hands out short, unique table aliases for one translation.
///
/// The prefix is the first ASCII letter of the seed, lowercased (`t` when the
/// seed has none). The first alias for a prefix is the bare letter, later ones
/// append a counter starting at 1: `u`, `u1`, `u2`.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    used: BTreeMap<char, u32>,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(&mut self, seed: &str) -> String {
        let prefix = seed
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');

        let count = self.used.entry(prefix).or_insert(0);
        let alias = if *count == 0 {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, count)
        };
        *count += 1;
        alias
    }
}
