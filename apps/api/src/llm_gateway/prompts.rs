// Cross-cutting prompt fragments for the gateway.
// Each agent defines its own prompts alongside its module; this file only
// carries the pieces the gateway itself injects.

/// System hint prepended to every call, followed by the route's schema text.
pub const JSON_SCHEMA_PREAMBLE: &str =
    "Reply with a single JSON object matching this schema. \
     Do NOT include any text outside the JSON object. \
     Do NOT use markdown code fences.";
