/// Arbitrary precision decimals, stored as a sign and a run of 64-bit digit
/// words, least significant first.
use num::bigint::{BigInt, Sign};
use num_traits::Zero;

use genheap::WORD_BYTES;

use crate::error::{err_type, RuntimeError};
use crate::headers::BuiltinType;
use crate::layout::decimal;
use crate::runtime::Interpreter;
use crate::value::Value;

const NEGATIVE: usize = 1;

fn to_digits(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .fold(0u64, |digit, byte| (digit << 8) | *byte as u64)
        })
        .collect()
}

fn from_digits(digits: &[u64]) -> Vec<u8> {
    digits.iter().flat_map(|digit| digit.to_le_bytes().to_vec()).collect()
}

impl Interpreter {
    pub fn decimal_new(&mut self, number: &BigInt) -> Result<Value, RuntimeError> {
        let (sign, bytes) = number.to_bytes_le();
        let digits = if number.is_zero() {
            Vec::new()
        } else {
            to_digits(&bytes)
        };

        let value = self.alloc(
            BuiltinType::Number.into(),
            (decimal::DIGITS + digits.len()) * WORD_BYTES,
        )?;
        let addr = self.address(value)?;

        let sign = if sign == Sign::Minus { NEGATIVE } else { 0 };
        self.set_raw(addr, decimal::SIGN, sign);
        self.set_raw(addr, decimal::DIGIT_COUNT, digits.len());
        for (i, digit) in digits.iter().enumerate() {
            self.set_raw(addr, decimal::DIGITS + i, *digit as usize);
        }

        Ok(value)
    }

    /// Parse a decimal integer literal
    pub fn decimal_parse(&mut self, text: &str) -> Result<Value, RuntimeError> {
        let number: BigInt = text
            .trim()
            .parse()
            .map_err(|_| err_type(&format!("invalid decimal literal '{}'", text)))?;

        self.decimal_new(&number)
    }

    pub fn decimal_value(&self, value: Value) -> Result<BigInt, RuntimeError> {
        let addr = self.address_of(value, BuiltinType::Number)?;

        let count = self.raw(addr, decimal::DIGIT_COUNT);
        let digits: Vec<u64> = (0..count)
            .map(|i| self.raw(addr, decimal::DIGITS + i) as u64)
            .collect();

        let sign = if count == 0 {
            Sign::NoSign
        } else if self.raw(addr, decimal::SIGN) == NEGATIVE {
            Sign::Minus
        } else {
            Sign::Plus
        };

        Ok(BigInt::from_bytes_le(sign, &from_digits(&digits)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::Config;

    #[test]
    fn test_digits() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let digits = to_digits(&bytes);
        assert!(digits == vec![0x0807_0605_0403_0201, 9]);
        assert!(from_digits(&digits)[..9] == bytes);
    }

    #[test]
    fn test_decimals() {
        let mut interp = Interpreter::new(Config::default()).unwrap();

        for text in &["0", "42", "-17", "123456789012345678901234567890"] {
            let d = interp.decimal_parse(text).unwrap();
            assert!(interp.kind_of(d) == BuiltinType::Number.into());
            assert!(interp.decimal_value(d).unwrap().to_string() == *text);
        }

        assert!(interp.decimal_parse("12x").is_err());
    }
}
