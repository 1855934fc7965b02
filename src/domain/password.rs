use secrecy::{ExposeSecret, Secret};

/// A password that satisfies the signup policy.
#[derive(Debug)]
pub struct NewPassword(Secret<String>);

impl NewPassword {
    pub fn parse(password: Secret<String>) -> Result<NewPassword, &'static str> {
        let length = password.expose_secret().chars().count();

        if length < 12 {
            return Err("Password must be at least 12 characters long.");
        }

        if length > 128 {
            return Err("Passwords must be at most 128 characters long.");
        }

        Ok(Self(password))
    }
}

impl ExposeSecret<String> for NewPassword {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}
