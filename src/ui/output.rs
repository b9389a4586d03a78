//! Styled status lines with a plain fallback

use super::context::UiContext;
use console::{style, Style};

#[derive(Clone, Copy)]
enum Tag {
    Ok,
    Warn,
    Info,
}

impl Tag {
    fn plain(self) -> console::StyledObject<&'static str> {
        match self {
            Tag::Ok => style("[OK]").green(),
            Tag::Warn => style("[WARN]").yellow(),
            Tag::Info => style("[INFO]").cyan(),
        }
    }

    fn fancy(self, message: String) {
        let shown = match self {
            Tag::Ok => cliclack::log::success(message),
            Tag::Warn => cliclack::log::warning(message),
            Tag::Info => cliclack::log::info(message),
        };
        shown.ok();
    }
}

fn step(ctx: &UiContext, tag: Tag, message: String) {
    if ctx.use_fancy_output() {
        tag.fancy(message);
    } else {
        println!("  {} {}", tag.plain(), message);
    }
}

/// Bold heading for a block of key/value lines
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::step(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, Tag::Ok, message.to_string());
}

/// Success line with a dimmed detail, such as a path
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Tag::Ok, format!("{} ({})", message, style(detail).dim()));
}

/// Warning followed by what to do about it
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step(ctx, Tag::Warn, format!("{} - {}", message, style(hint).dim()));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Tag::Info, message.to_string());
}

/// Dimmed follow-up line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Indented `key: value` line
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// `key: value` coloured green when `ok`, yellow otherwise
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.use_fancy_output() {
        let colour = if ok {
            Style::new().green()
        } else {
            Style::new().yellow()
        };
        println!("  {}: {}", style(key).dim(), colour.apply_to(value));
    } else {
        let tag = if ok { Tag::Ok } else { Tag::Warn };
        println!("  {} {}: {}", tag.plain(), key, value);
    }
}
