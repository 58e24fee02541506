/// Code pool options
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CodePoolConfig {
    /// Number of decimal digits in a displayable code
    ///
    /// Every reentry policy shares this space. Tickets are told apart by the
    /// suffix stored alongside the code, which users never see.
    pub digits: u32,

    /// Random draws to try before sweeping the code space in order
    pub random_attempts: u32,
}

impl Default for CodePoolConfig {
    fn default() -> CodePoolConfig {
        CodePoolConfig {
            digits: 4,
            random_attempts: 10,
        }
    }
}

impl CodePoolConfig {
    /// Number of distinct codes available to a single event
    pub fn space(&self) -> u32 {
        10u32.saturating_pow(self.digits)
    }
}

#[cfg(test)]
mod tests {
    use super::CodePoolConfig;

    #[test]
    fn it_sizes_code_space_from_digits() {
        assert_eq!(CodePoolConfig::default().space(), 10_000);
        assert_eq!(
            CodePoolConfig {
                digits: 2,
                random_attempts: 10
            }
            .space(),
            100
        );
    }
}
