/// A messaging contact. Only ever logged through [`PhoneNumber::masked`].
#[derive(Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("A phone number cannot be empty.".to_string());
        }
        Ok(Self(s.to_string()))
    }

    /// Splits a comma-separated contact list, dropping blank entries.
    pub fn parse_list(contacts: &str) -> Vec<Self> {
        contacts
            .split(',')
            .filter_map(|c| Self::parse(c).ok())
            .collect()
    }

    pub fn masked(&self) -> String {
        mask_phone(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PhoneNumber").field(&self.masked()).finish()
    }
}

/// `***` plus the last four characters, or `****` for short input.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{tail}")
    } else {
        "****".to_string()
    }
}
