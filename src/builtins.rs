//! Commands compiled into the launcher itself.

use std::rc::Rc;

use serde_json::json;

use crate::commands::{Command, CommandRegistry, RenderResult};
use crate::extensions::{ExtensionInfo, ExtensionResult, HostRequest, HostRequests};

/// Extension name owning the built-in commands.
pub const BUILTIN_EXTENSION: &str = "launcher";

/// Frame kind of the home page; the frontend renders it as the search view.
pub const HOME_KIND: &str = "launcher-home";

pub fn register(registry: &mut CommandRegistry, requests: &HostRequests) -> ExtensionResult<()> {
    let owner = Rc::new(ExtensionInfo::builtin(BUILTIN_EXTENSION, "Beacon"));

    registry.register(
        Command::view(owner.clone(), "home", "Search Commands")
            .with_description("Search every installed command")
            .with_handler(Rc::new(|| {
                Ok(Some(RenderResult::new(
                    HOME_KIND,
                    json!({ "placeholder": "Search commands..." }),
                )))
            })),
    )?;

    let requests = requests.clone();
    registry.register(
        Command::action(owner, "hide", "Hide Launcher").with_handler(Rc::new(move || {
            requests.push(HostRequest::Hide);
            Ok(None)
        })),
    )?;

    Ok(())
}
