// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::locking::LockStatusSink;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::env;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";
const TICK_CHARS: &str = "⣾⣽⣻⢿⡿⣟⣯⣷";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RendererKind {
    Tty,
    NonTty,
}

impl RendererKind {
    pub(crate) fn detect() -> Self {
        if !std::io::stderr().is_terminal() {
            return RendererKind::NonTty;
        }

        // CI logs and dumb terminals cannot redraw a spinner line.
        if env::var_os("CI").is_some() || env::var_os("NO_COLOR").is_some() {
            return RendererKind::NonTty;
        }
        if let Ok(term) = env::var("TERM")
            && term == "dumb"
        {
            return RendererKind::NonTty;
        }

        RendererKind::Tty
    }
}

/// Lock wait feedback on stderr.
///
/// Terminals get an animated spinner whose message tracks the wait. Anything
/// else gets one plain line per status, and the bar stays on a hidden target.
pub(crate) struct SpinnerStatusSink {
    bar: ProgressBar,
    kind: RendererKind,
    spinning: AtomicBool,
}

impl SpinnerStatusSink {
    pub(crate) fn for_stderr() -> Self {
        let kind = RendererKind::detect();
        let target = match kind {
            RendererKind::Tty => ProgressDrawTarget::stderr(),
            RendererKind::NonTty => ProgressDrawTarget::hidden(),
        };
        Self::new(kind, target)
    }

    fn new(kind: RendererKind, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_style(spinner_style());
        Self {
            bar,
            kind,
            spinning: AtomicBool::new(false),
        }
    }

    fn ensure_spinning(&self) {
        if !self.spinning.swap(true, Ordering::Relaxed) {
            self.bar.enable_steady_tick(Duration::from_millis(100));
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS)
}

impl LockStatusSink for SpinnerStatusSink {
    fn step(&self, message: &str) {
        match self.kind {
            RendererKind::Tty => {
                self.ensure_spinning();
                self.bar.set_message(message.to_string());
            }
            RendererKind::NonTty => eprintln!("  {message}"),
        }
    }

    fn success(&self, message: &str) {
        match self.kind {
            RendererKind::Tty => self
                .bar
                .finish_with_message(format!("{} {message}", "✓".green().bold())),
            RendererKind::NonTty => eprintln!("✓ {message}"),
        }
    }

    fn error(&self, message: &str) {
        match self.kind {
            RendererKind::Tty => self
                .bar
                .abandon_with_message(format!("{} {message}", "✗".red().bold())),
            RendererKind::NonTty => eprintln!("✗ {message}"),
        }
    }
}
