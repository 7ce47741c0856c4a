use rustyline::{Config, Editor, Result};

pub fn generate_prompt(healthy: bool) -> String {
    if healthy {
        "> ".to_string()
    } else {
        "(degraded) > ".to_string()
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}
