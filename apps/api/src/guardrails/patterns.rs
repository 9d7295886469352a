// Pattern tables for the input and output gates. Matched case-insensitively
// against whitespace-normalised text. Keep entries auditable: one concern per line.

/// Instruction override, prompt extraction, role reassignment, context dumps
/// and delimiter breaking.
pub const INJECTION_PATTERNS: &[&str] = &[
    // instruction override
    r"ignore.*(?:previous|above|all|prior|earlier).*(?:instruction|directive|prompt|rule|command)",
    r"disregard.*(?:previous|above|all|prior|earlier).*(?:instruction|directive|prompt|rule)",
    r"forget.*(?:previous|above|all|prior|earlier).*(?:instruction|directive|prompt|rule)",
    // system prompt extraction
    r"(?:reveal|show|display|output|print|echo|tell me).*(?:system|original|full|complete).*(?:prompt|instruction|directive|message)",
    r"(?:what|show).*(?:your|the).*(?:system|original|initial).*(?:prompt|instruction|message)",
    r"repeat.*(?:system|above|previous).*(?:prompt|instruction|message)",
    // role reassignment
    r"you are now",
    r"pretend (?:you are|to be)",
    r"act as (?:if|though)",
    r"roleplay as",
    r"switch to.*mode",
    r"enter.*mode",
    // context and data extraction
    r"(?:show|reveal|output|dump).*(?:context|data|frame|chunk|raw|internal)",
    r"(?:what|show).*(?:context|data).*(?:provided|given|passed)",
    // delimiter breaking
    r"```.*(?:system|ignore|override)",
    r"</?(?:system|admin|root|sudo)>",
];

/// Markers of internal structure leaking into generated text.
pub const LEAKAGE_PATTERNS: &[&str] = &[
    r"\*\*Frame \d+\*\*",
    r"Frame \d+:",
    r"frame #?\d+",
    r"chunk #?\d+",
    r"CONTEXT FROM RESUME:",
    r"---\s*\n.*(?:context|retrieved)",
    r"retrieved context:",
    r"CRITICAL SECURITY RULES:",
    r"INTERNAL STRUCTURE",
    r"System Message:",
    r"system prompt:",
];
