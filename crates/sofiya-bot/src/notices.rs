//! Short service notices sent by the access gate and scheduled jobs

use chrono::{DateTime, Utc};
use sofiya_core::{
    utils::{format_remaining, format_timestamp},
    Rental,
};

use crate::config::BotConfig;

/// Plan list shown to a group without access
pub fn rental_plans_notice(config: &BotConfig, group_id: &str) -> String {
    let mut notice = format!(
        "💰 {} - rental\n\n🚫 Access is not active\n\n📋 Plans:\n",
        config.bot.name
    );

    for plan in &config.rental.plans {
        notice.push_str(&format!(
            "🔹 {} - {} {} ({} hours)\n",
            plan.name, plan.price, config.rental.currency, plan.duration_hours
        ));
    }

    if let Some(owner) = &config.bot.owner_number {
        notice.push_str(&format!("\n📞 Contact: {}", owner_contact(owner)));
    }
    notice.push_str(&format!("\n🆔 Group ID: {}", group_id));
    notice
}

/// Warning sent to a group whose rental ends soon
pub fn expiry_warning_notice(rental: &Rental, now: DateTime<Utc>, owner: Option<&str>) -> String {
    let mut notice = format!(
        "⚠️ The rental in this group ends in {} ({} UTC).",
        format_remaining(rental.remaining(now)),
        format_timestamp(rental.end_date)
    );
    if let Some(owner) = owner {
        notice.push_str(&format!("\nTo extend, contact {}", owner_contact(owner)));
    }
    notice
}

/// Greeting for a new member when the group has welcome messages on
pub fn welcome_notice(bot_name: &str, group_name: &str, participant: &str) -> String {
    format!(
        "👋 Welcome to {}, @{}!\n🤖 I'm {}, this group's moderation assistant.",
        group_name,
        mention_handle(participant),
        bot_name
    )
}

/// Local part of a chat id, e.g. `79990000000` for `79990000000@s.whatsapp.net`
pub fn mention_handle(chat_id: &str) -> &str {
    chat_id.split('@').next().unwrap_or(chat_id)
}

fn owner_contact(owner: &str) -> String {
    format!("wa.me/{}", mention_handle(owner))
}
