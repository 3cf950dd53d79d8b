/// A recorded extreme: the value and when it was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurement {
    pub value: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Daily voltage/current extrema for one feeder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeederReading {
    pub name: Option<String>,
    pub ptr_no: Option<String>,
    pub max_voltage: Measurement,
    pub min_voltage: Measurement,
    pub max_current: Measurement,
    pub min_current: Measurement,
}

impl FeederReading {
    /// The four measurements in report column order.
    pub fn measurements(&self) -> [&Measurement; 4] {
        [
            &self.max_voltage,
            &self.min_voltage,
            &self.max_current,
            &self.min_current,
        ]
    }
}

/// Sort key for a feeder map key: the leading digits after the first `-`.
///
/// `feeder-12` → 12, `feeder-3a` → 3, `charger` or `feeder-x` → 0.
pub fn feeder_key_ordinal(key: &str) -> u64 {
    key.split('-')
        .nth(1)
        .map(|suffix| {
            let digits: String = suffix
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().unwrap_or(0)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_parses_leading_digits() {
        assert_eq!(feeder_key_ordinal("feeder-12"), 12);
        assert_eq!(feeder_key_ordinal("feeder-3a"), 3);
        assert_eq!(feeder_key_ordinal("feeder-7-b"), 7);
    }

    #[test]
    fn ordinal_defaults_to_zero() {
        assert_eq!(feeder_key_ordinal("charger"), 0);
        assert_eq!(feeder_key_ordinal("feeder-x"), 0);
        assert_eq!(feeder_key_ordinal("feeder-"), 0);
    }
}
