use exporter_install::completions::{self, CompletionShell};

use crate::args::Cli;

pub(crate) fn cmd_completions(shell: CompletionShell) {
    completions::generate_completions::<Cli>(shell, "exporter-install", &mut std::io::stdout());
}
