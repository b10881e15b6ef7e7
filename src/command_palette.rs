// Command Palette Module for pgodbc
//
// Holds the list of REPL commands with their descriptions and filters it by
// substring, which the REPL uses for `:help` and for suggestions when a
// command is not recognised.

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub usage: String,
    pub description: String,
}

#[derive(Debug)]
pub struct CommandPalette {
    commands: Vec<Command>,
}

impl Default for CommandPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPalette {
    /// Creates a new CommandPalette with the REPL's commands.
    pub fn new() -> Self {
        let entries = [
            ("open", ":open <dsn>", "Connect to an ODBC data source"),
            ("close", ":close", "Close the current connection"),
            ("status", ":status", "Show connection status"),
            ("reader", ":reader <sql>", "Stream the rows of a query one at a time"),
            ("export", ":export <format>", "Export the last result set (csv, json, markdown)"),
            ("next", ":next", "Show the next page of the last result set"),
            ("prev", ":prev", "Show the previous page of the last result set"),
            ("help", ":help", "List all available commands"),
            ("quit", ":quit", "Leave the REPL"),
        ];
        let commands = entries
            .iter()
            .map(|(name, usage, description)| Command {
                name: name.to_string(),
                usage: usage.to_string(),
                description: description.to_string(),
            })
            .collect();
        CommandPalette { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Searches for commands that contain the given query as a substring (case-insensitive)
    /// and returns the filtered list.
    pub fn filter_commands(&self, query: &str) -> Vec<Command> {
        let q = query.to_lowercase();
        self.commands
            .iter()
            .filter(|cmd| cmd.name.to_lowercase().contains(&q) || cmd.description.to_lowercase().contains(&q))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_commands() {
        let palette = CommandPalette::new();
        let filtered = palette.filter_commands("open");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "open");
    }

    #[test]
    fn test_filter_matches_descriptions() {
        let palette = CommandPalette::new();
        let names: Vec<String> = palette
            .filter_commands("connection")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["close", "status"]);
    }

    #[test]
    fn test_filter_finds_paging_commands() {
        let palette = CommandPalette::new();
        let names: Vec<String> = palette
            .filter_commands("page")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["next", "prev"]);
    }

    #[test]
    fn test_filter_without_match() {
        let palette = CommandPalette::new();
        assert!(palette.filter_commands("pragma").is_empty());
    }
}
