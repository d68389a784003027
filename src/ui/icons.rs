//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Phase indicators
pub static PLAN: Emoji<'_, '_> = Emoji("🧭 ", "[PLAN]");
pub static BUILD: Emoji<'_, '_> = Emoji("🔨 ", "[BUILD]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static FIX: Emoji<'_, '_> = Emoji("🔧 ", "[FIX]");
pub static RESUME: Emoji<'_, '_> = Emoji("🔄 ", "[RESUME]");

// File indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static SHIELD: Emoji<'_, '_> = Emoji("🛡️  ", "[FW]");
