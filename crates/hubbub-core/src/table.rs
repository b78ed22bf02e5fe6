//! Per-connection hook table.

use std::collections::HashMap;

use crate::hook::{CommandEntry, HookEntry};

/// Ordered, per-event-kind hook chains plus the command map for one
/// connection.
///
/// Tables are cheap to clone: entries hold `Arc`s. Cloning is how the
/// copy-on-write composite update builds its replacement before swapping
/// it in; a table is never mutated while installed.
#[derive(Clone, Default)]
pub struct HookTable {
    hooks: HashMap<String, Vec<HookEntry>>,
    commands: Vec<CommandEntry>,
}

impl HookTable {
    /// An empty table. Connections never run one of these directly;
    /// [`HookTable::baseline`] is the constructor the runtime uses.
    pub fn new() -> Self {
        Self::default()
    }

    /// The minimal table every connection starts from and returns to on
    /// reload: command routing plus the built-in commands.
    pub fn baseline() -> Self {
        let mut table = Self::new();
        crate::baseline::install(&mut table);
        table
    }

    /// Append a hook to the chain for `kind`. Chains keep insertion order.
    pub fn on(&mut self, kind: &str, entry: HookEntry) {
        self.hooks.entry(kind.to_string()).or_default().push(entry);
    }

    /// Register a command.
    pub fn add_command(&mut self, entry: CommandEntry) {
        self.commands.push(entry);
    }

    /// The hook chain for `kind`, in registration order.
    pub fn hooks_for(&self, kind: &str) -> &[HookEntry] {
        self.hooks.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a command by any of its names (case-insensitive).
    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|c| c.answers_to(name))
    }

    /// All registered commands, in registration order.
    pub fn commands(&self) -> &[CommandEntry] {
        &self.commands
    }

    /// Drop every hook and command owned by `module`.
    pub fn remove_module(&mut self, module: &str) {
        for chain in self.hooks.values_mut() {
            chain.retain(|e| e.module != module);
        }
        self.hooks.retain(|_, chain| !chain.is_empty());
        self.commands.retain(|c| c.module != module);
    }

    /// Total number of hook entries across all chains.
    pub fn hook_count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }
}
