use super::SubscriberEmail;

/// An opted-in subscriber as read from the warehouse.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub first_name: String,
    pub last_name: String,
    pub email: SubscriberEmail,
}

impl Subscriber {
    pub fn parse(first_name: String, last_name: String, email: String) -> Result<Self, String> {
        let email = SubscriberEmail::parse(email)?;
        Ok(Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
