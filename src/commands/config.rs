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

use crate::config::LockerConfig;
use crate::error::{KvLockError, Result};

pub struct ConfigCommand<'a> {
    config: &'a LockerConfig,
}

impl<'a> ConfigCommand<'a> {
    pub fn new(config: &'a LockerConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, json: bool) -> Result<()> {
        let rendered = self.render(json)?;
        println!("{}", rendered.trim_end());
        Ok(())
    }

    /// Effective configuration as TOML, or as pretty JSON when `json` is set.
    pub fn render(&self, json: bool) -> Result<String> {
        if json {
            serde_json::to_string_pretty(self.config)
                .map_err(|e| KvLockError::ConfigError(format!("Failed to serialize config: {e}")))
        } else {
            self.config.to_toml_string()
        }
    }
}
