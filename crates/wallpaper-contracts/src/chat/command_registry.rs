#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose argument is kept verbatim under the given key.
pub(crate) const RAW_ARG_COMMANDS: &[(CommandSpec, &str)] = &[
    (
        CommandSpec {
            command: "prompt",
            action: "set_prompt",
        },
        "prompt",
    ),
    (
        CommandSpec {
            command: "aspect",
            action: "set_aspect_ratio",
        },
        "aspect_ratio",
    ),
    (
        CommandSpec {
            command: "style",
            action: "set_style",
        },
        "style",
    ),
    (
        CommandSpec {
            command: "lang",
            action: "set_language",
        },
        "language",
    ),
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "base",
        action: "set_base_image",
    },
    CommandSpec {
        command: "save",
        action: "save_image",
    },
];

pub(crate) const INDEX_COMMAND: CommandSpec = CommandSpec {
    command: "select",
    action: "select_history",
};

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "enhance",
        action: "enhance",
    },
    CommandSpec {
        command: "suggest",
        action: "suggest",
    },
    CommandSpec {
        command: "upscale",
        action: "upscale",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "clear_history",
        action: "clear_history",
    },
    CommandSpec {
        command: "clear_base",
        action: "clear_base_image",
    },
    CommandSpec {
        command: "share",
        action: "share",
    },
    CommandSpec {
        command: "state",
        action: "state",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/generate",
    "/prompt",
    "/enhance",
    "/suggest",
    "/upscale",
    "/aspect",
    "/style",
    "/base",
    "/clear_base",
    "/lang",
    "/history",
    "/select",
    "/clear_history",
    "/save",
    "/share",
    "/state",
    "/quit",
];
