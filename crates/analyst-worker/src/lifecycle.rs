//! Worker lifecycle: install, then activate exactly once.

use analyst_core::store::ObjectStore;
use serde::Serialize;

use crate::{AppState, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
  /// Installed but still waiting; the mirror has not been loaded.
  Installed,
  Activated,
}

impl<S: ObjectStore> AppState<S> {
  pub fn install(&self) {
    self.logger.info("Service worker installing", None);
  }

  /// Load the mirror and start serving. Returns `false` if already active.
  pub async fn activate(&self) -> bool {
    {
      let mut state = lock(&self.lifecycle);
      if *state == Lifecycle::Activated {
        return false;
      }
      *state = Lifecycle::Activated;
    }
    self.logger.info("Service worker activating", None);
    self.load_all().await;
    true
  }

  /// Activate now if the worker is still waiting.
  pub async fn skip_waiting(&self) -> bool {
    self.logger.info("Service worker skipping waiting phase", None);
    self.activate().await
  }

  pub fn lifecycle(&self) -> Lifecycle {
    *lock(&self.lifecycle)
  }
}
