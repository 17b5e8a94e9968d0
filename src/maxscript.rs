//! MaxScript code generation.
//!
//! Everything the bridge asks 3ds Max to do goes through a small statement
//! grammar: create a menu, add a separator, nest a submenu, define and add an
//! action, attach to the main menu bar, flip the menu-enabled flag. A
//! [`Script`] is rendered to MaxScript text in one go so a whole menu build is
//! evaluated by the host in a single call.
//!
//! User-facing text (labels, tooltips, message box text) only ever appears
//! inside escaped string literals. Names spliced in as code (variables, macro
//! names, the dispatch function) must be [`Ident`]s or [`ActionId`]s, which are
//! restricted to `[A-Za-z0-9_]`.

use crate::allocator::{is_valid_identifier, ActionId};
use crate::error::{BridgeError, BridgeResult};
use std::borrow::Cow;
use std::fmt::{self, Write};

/// A MaxScript variable or function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(Cow<'static, str>);

impl Ident {
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        if is_valid_identifier(raw) {
            Ok(Self(Cow::Owned(raw.to_string())))
        } else {
            Err(BridgeError::InvalidIdentifier(raw.to_string()))
        }
    }

    /// For names hard-coded in this crate; covered by the tests below.
    pub(crate) const fn constant(raw: &'static str) -> Self {
        Self(Cow::Borrowed(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Global holding the menu-enabled flag inside the host.
pub const MENU_ENABLED_GLOBAL: Ident = Ident::constant("sgtk_main_menu_enabled");
pub const MAIN_MENU_VAR: Ident = Ident::constant("sgtk_menu_main");
pub const CONTEXT_MENU_VAR: Ident = Ident::constant("sgtk_menu_ctx");
pub const APP_MENU_VAR: Ident = Ident::constant("sgtk_menu_builder");
pub const DEFAULT_DISPATCH_FUNCTION: Ident = Ident::constant("sgtk_dispatch_action");
pub(crate) const MENU_RELOAD_CALLBACK_ID: Ident = Ident::constant("sgtk_menu_reload");

/// Printed by a macroScript clicked while a modal dialog is open.
pub const MODAL_WARNING: &str =
    "Shotgun Warning: You need to close the current window dialog before using any more commands.";

/// One MaxScript operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Unregisters any menu with the same label, then creates a fresh one in
    /// `var`.
    CreateMenu { var: Ident, label: String },
    /// Removes the menu titled `label`, if there is one.
    UnregisterMenu { label: String },
    AddSeparator { menu: Ident },
    /// Appends `submenu` to `parent` as an item titled `title`.
    AddSubMenu {
        submenu: Ident,
        parent: Ident,
        title: String,
    },
    /// Defines a macroScript that dispatches `id` when the guard is enabled,
    /// and appends it to `menu`.
    AddAction {
        menu: Ident,
        id: ActionId,
        title: String,
        tooltip: String,
        category: String,
        dispatch: Ident,
    },
    /// Inserts `menu` into the main menu bar just before its last entry.
    AttachToMainMenuBar { menu: Ident, title: String },
    SetMenuEnabled(bool),
    /// Rebuilds the menu through `dispatch` after the host reloads its menu
    /// file.
    RegisterMenuReloadHook { id: ActionId, dispatch: Ident },
    UnregisterMenuReloadHook,
    MessageBox { title: String, text: String },
    /// Opens a URL or path with the system handler.
    ShellLaunch { target: String },
    /// Opens a scene file without prompting.
    LoadMaxFile { path: String },
    Print(String),
}

impl Statement {
    fn render_into(&self, out: &mut String) -> fmt::Result {
        match self {
            Statement::CreateMenu { var, label } => {
                let label = quote(label);
                writeln!(out, "-- clear the old menu")?;
                writeln!(out, "sgtk_oldMenu = menuMan.findMenu {}", label)?;
                writeln!(
                    out,
                    "if sgtk_oldMenu != undefined then menuMan.unregisterMenu sgtk_oldMenu"
                )?;
                writeln!(out, "{} = menuMan.createMenu {}", var, label)
            }
            Statement::UnregisterMenu { label } => {
                writeln!(out, "sgtk_oldMenu = menuMan.findMenu {}", quote(label))?;
                writeln!(
                    out,
                    "if sgtk_oldMenu != undefined then menuMan.unregisterMenu sgtk_oldMenu"
                )?;
                writeln!(out, "menuMan.updateMenuBar()")
            }
            Statement::AddSeparator { menu } => {
                writeln!(out, "sgtk_menu_separator = menuMan.createSeparatorItem()")?;
                writeln!(out, "{}.addItem sgtk_menu_separator -1", menu)
            }
            Statement::AddSubMenu {
                submenu,
                parent,
                title,
            } => {
                writeln!(
                    out,
                    "sgtk_menu_sub_item = menuMan.createSubMenuItem {} {}",
                    quote(title),
                    submenu
                )?;
                writeln!(out, "{}.addItem sgtk_menu_sub_item -1", parent)
            }
            Statement::AddAction {
                menu,
                id,
                title,
                tooltip,
                category,
                dispatch,
            } => {
                let category = quote(category);
                writeln!(out, "macroScript {}", id)?;
                writeln!(out, "category: {}", category)?;
                writeln!(out, "tooltip: {}", quote(tooltip))?;
                writeln!(out, "(")?;
                writeln!(out, "    on execute do")?;
                writeln!(out, "    (")?;
                writeln!(
                    out,
                    "        if ({g} != undefined and {g} == True) then",
                    g = MENU_ENABLED_GLOBAL
                )?;
                writeln!(out, "            {} {}", dispatch, quote(id.as_str()))?;
                writeln!(out, "        else")?;
                writeln!(out, "            print {}", quote(MODAL_WARNING))?;
                writeln!(out, "    )")?;
                writeln!(out, ")")?;
                writeln!(
                    out,
                    "sgtk_menu_action = menuMan.createActionItem {} {}",
                    quote(id.as_str()),
                    category
                )?;
                writeln!(out, "sgtk_menu_action.setUseCustomTitle true")?;
                writeln!(out, "sgtk_menu_action.setTitle({})", quote(title))?;
                writeln!(out, "{}.addItem sgtk_menu_action -1", menu)
            }
            Statement::AttachToMainMenuBar { menu, title } => {
                writeln!(out, "-- second to last, which should be before Help")?;
                writeln!(out, "sgtk_main_menu_bar = menuMan.getMainMenuBar()")?;
                writeln!(
                    out,
                    "sgtk_sub_menu_index = sgtk_main_menu_bar.numItems() - 1"
                )?;
                writeln!(
                    out,
                    "sgtk_sub_menu_item = menuMan.createSubMenuItem {} {}",
                    quote(title),
                    menu
                )?;
                writeln!(
                    out,
                    "sgtk_main_menu_bar.addItem sgtk_sub_menu_item sgtk_sub_menu_index"
                )?;
                writeln!(out, "menuMan.updateMenuBar()")
            }
            Statement::SetMenuEnabled(enabled) => writeln!(
                out,
                "{} = {}",
                MENU_ENABLED_GLOBAL,
                if *enabled { "True" } else { "False" }
            ),
            Statement::RegisterMenuReloadHook { id, dispatch } => {
                let call = format!("{} {}", dispatch, quote(id.as_str()));
                writeln!(
                    out,
                    "callbacks.removeScripts id:#{}",
                    MENU_RELOAD_CALLBACK_ID
                )?;
                writeln!(
                    out,
                    "callbacks.addScript #postLoadingMenus {} id:#{}",
                    quote(&call),
                    MENU_RELOAD_CALLBACK_ID
                )
            }
            Statement::UnregisterMenuReloadHook => writeln!(
                out,
                "callbacks.removeScripts id:#{}",
                MENU_RELOAD_CALLBACK_ID
            ),
            Statement::MessageBox { title, text } => writeln!(
                out,
                "messagebox {} title:{}",
                quote(text),
                quote(title)
            ),
            Statement::ShellLaunch { target } => {
                writeln!(out, "ShellLaunch {} \"\"", quote(target))
            }
            Statement::LoadMaxFile { path } => {
                writeln!(out, "loadMaxFile {} quiet:true", quote(path))
            }
            Statement::Print(text) => writeln!(out, "print {}", quote(text)),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut out);
        out
    }
}

/// An ordered MaxScript program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    statements: Vec<Statement>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
        }
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            let _ = statement.render_into(&mut out);
        }
        out
    }
}

/// Renders `text` as a MaxScript string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
