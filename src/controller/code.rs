//! Random business codes for records created without one.

use crate::config::CodeSettings;
use crate::controller::identifier::is_numeric;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// `prefix + N random chars from [A-Za-z0-9] + suffix`.
/// A code that would parse as an id is drawn again, so every code stays reachable by lookup.
#[derive(Clone, Debug)]
pub struct CodeGenerator {
    settings: CodeSettings,
}

impl CodeGenerator {
    pub fn new(settings: CodeSettings) -> Self {
        CodeGenerator { settings }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let body: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(self.settings.length)
                .map(char::from)
                .collect();
            let code = format!("{}{}{}", self.settings.prefix, body, self.settings.suffix);
            if !is_numeric(&code) {
                return code;
            }
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        CodeGenerator::new(CodeSettings::default())
    }
}
