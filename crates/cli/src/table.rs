//! The skill table the binary routes with.

use std::path::Path;

use {
    anyhow::{Context as _, Result},
    courier_config::CourierConfig,
    courier_skills::{Command, ParamSpec, ParamType, SkillGroup, SkillTable},
    tracing::info,
};

/// Load the configured skills file, or the built-in ENS table when none is
/// configured.
pub fn load(config: &CourierConfig, config_path: Option<&Path>) -> Result<SkillTable> {
    match config.skills.resolve(config_path) {
        Some(path) => courier_skills::load_table(&path)
            .with_context(|| format!("failed to load skills from {}", path.display())),
        None => {
            info!("no skills file configured, using the built-in ENS table");
            Ok(ens_table()?)
        },
    }
}

/// The ENS domain bot: every command goes to the `ens` handler, the
/// `@ensbot` tag to the `ens-agent` handler.
pub fn ens_table() -> courier_skills::Result<SkillTable> {
    let domain = || ParamSpec::string("domain");
    let group = SkillGroup::new("Ens Domain Bot")
        .description("Register ENS domains.")
        .tag("@ensbot", Some("ens-agent"))
        .command(
            Command::new("register")
                .trigger("/register")
                .param(domain())
                .handler("ens")
                .description(
                    "Register a new ENS domain. Returns a URL to complete the registration process.",
                )
                .example("/register vitalik.eth"),
        )
        .command(
            Command::new("info")
                .trigger("/info")
                .param(domain())
                .handler("ens")
                .description(
                    "Get detailed information about an ENS domain including owner, expiry date, and resolver.",
                )
                .example("/info nick.eth"),
        )
        .command(
            Command::new("renew")
                .trigger("/renew")
                .param(domain())
                .handler("ens")
                .description(
                    "Extend the registration period of your ENS domain. Returns a URL to complete the renewal.",
                )
                .example("/renew fabri.base.eth"),
        )
        .command(
            Command::new("check")
                .trigger("/check")
                .param(domain())
                .param(ParamSpec::quoted("cool_alternatives"))
                .handler("ens")
                .description("Check if a domain is available."),
        )
        .command(
            Command::new("cool")
                .trigger("/cool")
                .param(domain())
                .handler("ens")
                .description("Get cool alternatives for a .eth domain."),
        )
        .command(
            Command::new("reset")
                .trigger("/reset")
                .admin_only()
                .handler("ens")
                .description("Reset the conversation."),
        )
        .command(
            Command::new("tip")
                .trigger("/tip")
                .param(ParamSpec::new("address", ParamType::Address))
                .handler("ens")
                .description("Show a URL for tipping a domain owner."),
        )
        .command(
            Command::new("help")
                .trigger("/help")
                .handler("help")
                .description("List every command."),
        );
    SkillTable::new(vec![group])
}
