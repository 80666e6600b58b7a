//! Phone number handling for chat user ids

use crate::error::{Error, Result};

/// Suffix the chat network uses for one-to-one user ids
pub const CHAT_ID_SUFFIX: &str = "@c.us";

/// Normalize a Brazilian phone number to country + area + subscriber digits.
///
/// Areas up to 30 use nine-digit mobiles, so an eight-digit number gains a
/// leading 9. Areas from 31 up are addressed without it, so a nine-digit number
/// starting with 9 loses it.
pub fn adjust_phone_number(phone: &str) -> Result<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 12 || digits.len() > 13 {
        return Err(Error::InvalidPhone(phone.to_string()));
    }

    let (country, rest) = digits.split_at(2);
    let (area, number) = rest.split_at(2);
    let area_code: u32 = area
        .parse()
        .map_err(|_| Error::InvalidPhone(phone.to_string()))?;

    let number = if area_code <= 30 && number.len() == 8 {
        format!("9{}", number)
    } else if area_code >= 31 && number.len() == 9 && number.starts_with('9') {
        number[1..].to_string()
    } else {
        number.to_string()
    };

    Ok(format!("{}{}{}", country, area, number))
}

/// Canonical chat id for a user reference; ids that already name a chat pass through
pub fn chat_id_for(user: &str) -> Result<String> {
    let user = user.trim();
    if user.contains('@') {
        return Ok(user.to_string());
    }
    Ok(format!("{}{}", adjust_phone_number(user)?, CHAT_ID_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_area_gains_nine() {
        assert_eq!(adjust_phone_number("551188887777").unwrap(), "5511988887777");
    }

    #[test]
    fn test_low_area_nine_digits_unchanged() {
        assert_eq!(adjust_phone_number("5511988887777").unwrap(), "5511988887777");
    }

    #[test]
    fn test_high_area_drops_nine() {
        assert_eq!(adjust_phone_number("5584999998888").unwrap(), "558499998888");
    }

    #[test]
    fn test_high_area_eight_digits_unchanged() {
        assert_eq!(adjust_phone_number("558499998888").unwrap(), "558499998888");
    }

    #[test]
    fn test_formatting_stripped() {
        assert_eq!(
            adjust_phone_number("+55 (84) 9999-8888").unwrap(),
            "558499998888"
        );
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(matches!(
            adjust_phone_number("12345"),
            Err(Error::InvalidPhone(_))
        ));
        assert!(adjust_phone_number("55849999988881").is_err());
    }

    #[test]
    fn test_chat_id_for() {
        assert_eq!(chat_id_for("5584999998888").unwrap(), "558499998888@c.us");
        assert_eq!(chat_id_for("someone@c.us").unwrap(), "someone@c.us");
        assert!(chat_id_for("bob").is_err());
    }
}
