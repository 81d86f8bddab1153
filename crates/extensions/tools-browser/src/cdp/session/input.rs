//! Input (mouse and keyboard) operations for CDP page session.

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{KeyEventType, MouseButton, MouseEventType};

use super::core::PageSession;

const MOD_ALT: i32 = 1;
const MOD_CTRL: i32 = 2;
const MOD_META: i32 = 4;
const MOD_SHIFT: i32 = 8;

/// Key name, DOM code, virtual key code and inserted text for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: i64,
    pub text: Option<String>,
}

impl KeyDefinition {
    pub(super) fn lookup(name: &str) -> Self {
        let named = |key: &str, code: &str, key_code: i64, text: Option<&str>| KeyDefinition {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(|t| t.to_string()),
        };
        match name {
            "Enter" | "Return" => named("Enter", "Enter", 13, Some("\r")),
            "Tab" => named("Tab", "Tab", 9, None),
            "Escape" | "Esc" => named("Escape", "Escape", 27, None),
            "Backspace" => named("Backspace", "Backspace", 8, None),
            "Delete" => named("Delete", "Delete", 46, None),
            "Space" | " " => named(" ", "Space", 32, Some(" ")),
            "ArrowLeft" => named("ArrowLeft", "ArrowLeft", 37, None),
            "ArrowUp" => named("ArrowUp", "ArrowUp", 38, None),
            "ArrowRight" => named("ArrowRight", "ArrowRight", 39, None),
            "ArrowDown" => named("ArrowDown", "ArrowDown", 40, None),
            "Home" => named("Home", "Home", 36, None),
            "End" => named("End", "End", 35, None),
            "PageUp" => named("PageUp", "PageUp", 33, None),
            "PageDown" => named("PageDown", "PageDown", 34, None),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => {
                        let upper = c.to_ascii_uppercase();
                        let code = if c.is_ascii_digit() {
                            format!("Digit{}", c)
                        } else {
                            format!("Key{}", upper)
                        };
                        KeyDefinition {
                            key: c.to_string(),
                            code,
                            key_code: upper as i64,
                            text: Some(c.to_string()),
                        }
                    }
                    (Some(c), None) => KeyDefinition {
                        key: c.to_string(),
                        code: String::new(),
                        key_code: 0,
                        text: Some(c.to_string()),
                    },
                    _ => named(other, other, 0, None),
                }
            }
        }
    }
}

impl PageSession {
    async fn mouse_event(&self, event: MouseEventType, x: f64, y: f64, button: MouseButton) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": event,
                "x": x,
                "y": y,
                "button": button,
                "clickCount": 1,
            })),
        )
        .await?;
        Ok(())
    }

    /// Click at coordinates.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, x, y, MouseButton::None).await?;
        self.mouse_event(MouseEventType::MousePressed, x, y, MouseButton::Left).await?;
        self.mouse_event(MouseEventType::MouseReleased, x, y, MouseButton::Left).await?;
        debug!("Clicked at ({}, {})", x, y);
        Ok(())
    }

    /// Move mouse to coordinates.
    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, x, y, MouseButton::None).await
    }

    /// Press at `from`, move in steps, release at `to`.
    pub async fn drag_between(&self, from: (f64, f64), to: (f64, f64)) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, from.0, from.1, MouseButton::None).await?;
        self.mouse_event(MouseEventType::MousePressed, from.0, from.1, MouseButton::Left).await?;
        const STEPS: u32 = 5;
        for step in 1..=STEPS {
            let t = step as f64 / STEPS as f64;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": MouseEventType::MouseMoved,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "buttons": 1,
                })),
            )
            .await?;
        }
        self.mouse_event(MouseEventType::MouseReleased, to.0, to.1, MouseButton::Left).await
    }

    /// Scroll by delta with the wheel at (x, y).
    pub async fn wheel(&self, x: f64, y: f64, delta_x: f64, delta_y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseWheel,
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            })),
        )
        .await?;
        Ok(())
    }

    /// Type text.
    pub async fn type_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        debug!("Typed {} characters", text.chars().count());
        Ok(())
    }

    /// Press a key or combination (e.g. "Enter", "Control+a").
    pub async fn press_key_combo(&self, combo: &str) -> Result<(), CdpError> {
        let parts: Vec<&str> = if combo == "+" { vec!["+"] } else { combo.split('+').collect() };
        let (key_name, modifier_names) = match parts.split_last() {
            Some((last, rest)) => (*last, rest),
            None => return Ok(()),
        };
        let modifiers = Self::get_modifiers(modifier_names);
        let def = KeyDefinition::lookup(key_name);
        // Shortcuts must not insert their character.
        let text = if modifiers & (MOD_CTRL | MOD_META | MOD_ALT) != 0 {
            None
        } else {
            def.text.clone()
        };

        let down_type = if text.is_some() {
            KeyEventType::KeyDown
        } else {
            KeyEventType::RawKeyDown
        };
        let mut down = json!({
            "type": down_type,
            "key": def.key,
            "code": def.code,
            "windowsVirtualKeyCode": def.key_code,
            "modifiers": modifiers,
        });
        if let Some(t) = &text {
            down["text"] = json!(t);
        }
        self.call("Input.dispatchKeyEvent", Some(down)).await?;

        self.call(
            "Input.dispatchKeyEvent",
            Some(json!({
                "type": KeyEventType::KeyUp,
                "key": def.key,
                "code": def.code,
                "windowsVirtualKeyCode": def.key_code,
                "modifiers": modifiers,
            })),
        )
        .await?;

        Ok(())
    }

    /// Get modifier flags from modifier names.
    pub(super) fn get_modifiers(modifiers: &[&str]) -> i32 {
        let mut flags = 0;
        for m in modifiers {
            match m.to_lowercase().as_str() {
                "alt" | "option" => flags |= MOD_ALT,
                "control" | "ctrl" => flags |= MOD_CTRL,
                "meta" | "command" | "cmd" => flags |= MOD_META,
                "shift" => flags |= MOD_SHIFT,
                _ => {}
            }
        }
        flags
    }
}
