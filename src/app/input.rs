/// One line of REPL input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Message(String),
    /// `/backend` lists profiles, `/backend NAME` switches.
    Backend(Option<String>),
    /// `/model` lists models, `/model ID` switches.
    Model(Option<String>),
    Copy,
    CopyAll,
    ToggleShell,
    /// `!cmd`, or any plain line while the shell pane is on.
    Shell(String),
    Retry,
    Clear,
    Status,
    Tools,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
/backend [NAME]  list backends or switch
/model [ID]      list models or switch
/copy            copy the last response
/copyall         copy the whole transcript
/shell           toggle the shell pane
!<cmd>           run one shell command
/retry           resend the last failed request
/clear           forget the conversation
/status          session and progress status
/tools           list registered tools
/help            this help
/quit            exit
Ctrl-C while a response streams aborts it.";

pub fn parse_input(line: &str, shell_mode: bool) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    if let Some(command) = line.strip_prefix('!') {
        let command = command.trim();
        return if command.is_empty() {
            ReplInput::Empty
        } else {
            ReplInput::Shell(command.to_string())
        };
    }
    let Some(rest) = line.strip_prefix('/') else {
        return if shell_mode {
            ReplInput::Shell(line.to_string())
        } else {
            ReplInput::Message(line.to_string())
        };
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match name {
        "backend" | "backends" => ReplInput::Backend(arg),
        "model" | "models" => ReplInput::Model(arg),
        "copy" => ReplInput::Copy,
        "copyall" => ReplInput::CopyAll,
        "shell" => ReplInput::ToggleShell,
        "retry" => ReplInput::Retry,
        "clear" => ReplInput::Clear,
        "status" => ReplInput::Status,
        "tools" => ReplInput::Tools,
        "help" | "?" => ReplInput::Help,
        "quit" | "exit" | "q" => ReplInput::Quit,
        _ => ReplInput::Unknown(line.to_string()),
    }
}
