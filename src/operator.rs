//! Console commands for whoever is standing next to the screen.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Skip,
    Dismiss,
    ReducedMotion(bool),
    Status,
    Quit,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?.to_ascii_lowercase();
        let argument = words.next().map(|word| word.to_ascii_lowercase());

        match (command.as_str(), argument.as_deref()) {
            ("skip" | "next" | "n", None) => Some(Self::Skip),
            ("dismiss" | "d", None) => Some(Self::Dismiss),
            ("motion", Some("on")) => Some(Self::ReducedMotion(false)),
            ("motion", Some("off" | "reduced")) => Some(Self::ReducedMotion(true)),
            ("status" | "s", None) => Some(Self::Status),
            ("quit" | "exit" | "q", None) => Some(Self::Quit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(OperatorCommand::parse("skip"), Some(OperatorCommand::Skip));
        assert_eq!(OperatorCommand::parse("  N "), Some(OperatorCommand::Skip));
        assert_eq!(OperatorCommand::parse("dismiss"), Some(OperatorCommand::Dismiss));
        assert_eq!(
            OperatorCommand::parse("motion off"),
            Some(OperatorCommand::ReducedMotion(true))
        );
        assert_eq!(
            OperatorCommand::parse("Motion On"),
            Some(OperatorCommand::ReducedMotion(false))
        );
        assert_eq!(OperatorCommand::parse("q"), Some(OperatorCommand::Quit));
    }

    #[test]
    fn rejects_unknown_or_malformed() {
        assert_eq!(OperatorCommand::parse(""), None);
        assert_eq!(OperatorCommand::parse("motion"), None);
        assert_eq!(OperatorCommand::parse("skip 3"), None);
        assert_eq!(OperatorCommand::parse("reboot"), None);
    }
}
