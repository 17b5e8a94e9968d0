//! Shotgun menu generation for 3ds Max.
//!
//! Menus are created through MaxScript rather than through direct SDK
//! action items: an action item that calls straight into the bridge crashes
//! Max when it is clicked while a modal dialog is open, whereas a macroScript
//! can test `sgtk_main_menu_enabled` first.
//!
//! A build first plans a [`Menu`] tree (allocating ids and registering
//! callbacks as it goes), then renders the whole tree to a single [`Script`].

use crate::allocator::{ActionId, IdentifierAllocator};
use crate::command::{AppCommand, Command, CommandKind, Favourite};
use crate::error::BridgeResult;
use crate::host::HostBridge;
use crate::maxscript::{Ident, Script, Statement, APP_MENU_VAR, CONTEXT_MENU_VAR, MAIN_MENU_VAR};
use crate::registry::{ActionRegistry, ActionTarget};
use crate::settings::EngineSettings;
use std::collections::BTreeMap;

/// Group for commands that do not belong to an app.
pub const OTHER_ITEMS: &str = "Other Items";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Main,
    Context,
    App,
}

impl MenuKind {
    fn var(&self) -> Ident {
        match self {
            MenuKind::Main => MAIN_MENU_VAR,
            MenuKind::Context => CONTEXT_MENU_VAR,
            MenuKind::App => APP_MENU_VAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuNode {
    Action {
        label: String,
        id: ActionId,
        /// Command description, or the label when there is none.
        tooltip: String,
    },
    Submenu(Menu),
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    pub label: String,
    pub kind: MenuKind,
    pub items: Vec<MenuNode>,
}

/// The root of a built menu.
pub type MenuTree = Menu;

impl Menu {
    pub fn new(label: impl Into<String>, kind: MenuKind) -> Self {
        Self {
            label: label.into(),
            kind,
            items: Vec::new(),
        }
    }

    pub fn submenu(&self, label: &str) -> Option<&Menu> {
        self.items.iter().find_map(|item| match item {
            MenuNode::Submenu(menu) if menu.label == label => Some(menu),
            _ => None,
        })
    }

    /// Labels of the actions directly in this menu, in order.
    pub fn action_labels(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                MenuNode::Action { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Labels of the submenus directly in this menu, in order.
    pub fn submenu_labels(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                MenuNode::Submenu(menu) => Some(menu.label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every action in this menu and its submenus, depth first.
    pub fn all_actions(&self) -> Vec<(&str, &ActionId)> {
        let mut out = Vec::new();
        self.collect_actions(&mut out);
        out
    }

    fn collect_actions<'a>(&'a self, out: &mut Vec<(&'a str, &'a ActionId)>) {
        for item in &self.items {
            match item {
                MenuNode::Action { label, id, .. } => out.push((label.as_str(), id)),
                MenuNode::Submenu(menu) => menu.collect_actions(out),
                MenuNode::Separator => {}
            }
        }
    }
}

/// Builds the Shotgun menu into the host.
pub struct MenuBuilder<'a> {
    host: &'a dyn HostBridge,
    registry: &'a ActionRegistry,
    settings: &'a EngineSettings,
    allocator: IdentifierAllocator,
}

impl<'a> MenuBuilder<'a> {
    pub fn new(
        host: &'a dyn HostBridge,
        registry: &'a ActionRegistry,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            host,
            registry,
            settings,
            allocator: IdentifierAllocator::new(),
        }
    }

    /// Tears down the previous menu and builds a new one.
    ///
    /// `context_actions` are the engine's own context entries (jump to site,
    /// jump to file system); they head the context submenu.
    pub fn build(
        &self,
        commands: &[Command],
        favourites: &[Favourite],
        context_label: &str,
        context_actions: &[Command],
    ) -> BridgeResult<MenuTree> {
        let label = &self.settings.menu_label;
        if self.host.menu_exists(label) {
            log::debug!("Removing existing '{}' menu", label);
            self.host.unregister_menu(label)?;
        }

        self.registry.begin_generation();
        let tree = self.plan(commands, favourites, context_label, context_actions);
        let script = self.render(&tree)?;
        self.host.run_script(&script)?;

        log::debug!(
            "Built '{}' menu with {} action(s)",
            label,
            tree.all_actions().len()
        );
        Ok(tree)
    }

    fn plan(
        &self,
        commands: &[Command],
        favourites: &[Favourite],
        context_label: &str,
        context_actions: &[Command],
    ) -> MenuTree {
        let mut items: Vec<AppCommand> = commands.iter().cloned().map(AppCommand::new).collect();
        let mut root = Menu::new(self.settings.menu_label.clone(), MenuKind::Main);

        // context menu
        let mut ctx = Menu::new(context_label, MenuKind::Context);
        for command in context_actions {
            ctx.items.push(self.action_node(command));
        }
        let context_commands: Vec<&AppCommand> = items
            .iter()
            .filter(|cmd| cmd.kind() == CommandKind::ContextMenu)
            .collect();
        if !context_commands.is_empty() {
            ctx.items.push(MenuNode::Separator);
            for cmd in context_commands {
                ctx.items.push(self.action_node(&cmd.command));
            }
        }
        root.items.push(MenuNode::Submenu(ctx));
        root.items.push(MenuNode::Separator);

        // favourites
        for favourite in favourites {
            for cmd in items.iter_mut() {
                if cmd.matches_favourite(favourite) {
                    root.items.push(self.action_node(&cmd.command));
                    cmd.favourite = true;
                }
            }
        }
        root.items.push(MenuNode::Separator);

        // everything else, grouped by app
        let mut commands_by_app: BTreeMap<&str, Vec<&AppCommand>> = BTreeMap::new();
        for cmd in &items {
            if cmd.kind() == CommandKind::ContextMenu || cmd.favourite {
                continue;
            }
            commands_by_app
                .entry(cmd.app_name().unwrap_or(OTHER_ITEMS))
                .or_default()
                .push(cmd);
        }

        for (app_name, cmds) in commands_by_app {
            if cmds.len() > 1 {
                let mut submenu = Menu::new(app_name, MenuKind::App);
                for cmd in cmds {
                    submenu.items.push(self.action_node(&cmd.command));
                }
                root.items.push(MenuNode::Submenu(submenu));
            } else {
                for cmd in cmds {
                    root.items.push(self.action_node(&cmd.command));
                }
            }
        }

        root
    }

    fn action_node(&self, command: &Command) -> MenuNode {
        let id = self.allocator.allocate(&command.name, self.registry);
        self.registry.register(
            id.clone(),
            ActionTarget::from_callback(command.name.clone(), command.callback.clone()),
        );
        MenuNode::Action {
            label: command.name.clone(),
            id,
            tooltip: command
                .properties
                .description
                .clone()
                .unwrap_or_else(|| command.name.clone()),
        }
    }

    fn render(&self, tree: &MenuTree) -> BridgeResult<Script> {
        let dispatch = self.settings.dispatch_ident()?;
        let mut script = Script::new();
        self.render_menu(tree, &dispatch, &mut script);
        script.push(Statement::AttachToMainMenuBar {
            menu: tree.kind.var(),
            title: tree.label.clone(),
        });
        Ok(script)
    }

    fn render_menu(&self, menu: &Menu, dispatch: &Ident, script: &mut Script) {
        let var = menu.kind.var();
        script.push(Statement::CreateMenu {
            var: var.clone(),
            label: menu.label.clone(),
        });
        for item in &menu.items {
            match item {
                MenuNode::Action { label, id, tooltip } => script.push(Statement::AddAction {
                    menu: var.clone(),
                    id: id.clone(),
                    title: label.clone(),
                    tooltip: tooltip.clone(),
                    category: self.settings.macro_category.clone(),
                    dispatch: dispatch.clone(),
                }),
                MenuNode::Separator => script.push(Statement::AddSeparator { menu: var.clone() }),
                MenuNode::Submenu(submenu) => {
                    // Submenus are completed before the parent continues, so
                    // sibling submenus can share a variable.
                    self.render_menu(submenu, dispatch, script);
                    script.push(Statement::AddSubMenu {
                        submenu: submenu.kind.var(),
                        parent: var.clone(),
                        title: submenu.label.clone(),
                    });
                }
            }
        }
    }
}
