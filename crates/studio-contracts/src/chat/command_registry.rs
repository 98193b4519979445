#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

const fn spec(command: &'static str, action: &'static str, arg_key: &'static str) -> CommandSpec {
    CommandSpec {
        command,
        action,
        arg_key,
    }
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    spec("mode", "set_mode", "mode"),
    spec("style", "set_style", "style"),
    spec("factor", "set_factor", "factor"),
    spec("prompt", "set_prompt", "prompt"),
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    spec("image", "set_image", "path"),
    spec("person", "set_image", "path"),
    spec("reference", "set_reference", "path"),
    spec("garment", "set_reference", "path"),
    spec("save", "save", "path"),
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[spec("tray", "tray_add", "paths")];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[
    spec("untray", "tray_remove", "index"),
    spec("pick", "tray_pick", "index"),
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    spec("go", "submit", ""),
    spec("run", "submit", ""),
    spec("status", "status", ""),
    spec("clear_image", "clear_image", ""),
    spec("clear_reference", "clear_reference", ""),
    spec("help", "help", ""),
    spec("quit", "quit", ""),
    spec("exit", "quit", ""),
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/mode <text|edit|tryon|upscale>",
    "/style <name>",
    "/factor <2|4>",
    "/prompt <text>",
    "/image <path>",
    "/reference <path>",
    "/clear_image",
    "/clear_reference",
    "/tray <paths...>",
    "/untray <index>",
    "/pick <index>",
    "/go",
    "/save [dir]",
    "/status",
    "/help",
    "/quit",
];
