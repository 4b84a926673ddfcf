use crate::materialize::{PlannedAction, PlannedFile};
use colored::{ColoredString, Colorize};
use std::{
    io::{self, Write},
    path::Path,
};

/// Represents a node in the tree (either file or directory).
#[derive(Debug)]
struct TreeNode<'a> {
    name: String,
    children: Vec<TreeNode<'a>>,
    /// `None` for directories.
    action: Option<&'a PlannedAction>,
}
impl<'a> TreeNode<'a> {
    fn new(name: String, action: Option<&'a PlannedAction>) -> Self {
        Self {
            name,
            children: Vec::new(),
            action,
        }
    }

    /// Returns the child directory called `name`, creating it on first use.
    fn child_dir(&mut self, name: &str) -> &mut TreeNode<'a> {
        let index = match self
            .children
            .iter()
            .position(|child| child.action.is_none() && child.name == name)
        {
            Some(index) => index,
            None => {
                self.children.push(TreeNode::new(name.to_string(), None));
                self.children.len() - 1
            }
        };

        &mut self.children[index]
    }
}

/// Build the directory tree from the planned files, returning the root node.
fn build_tree<'a>(planned: &'a [PlannedFile], destination: &Path) -> TreeNode<'a> {
    let root_name = destination
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| destination.display().to_string());

    let mut root = TreeNode::new(root_name, None);

    for file in planned {
        let Some((leaf, parents)) = file.path.segments().split_last() else {
            continue;
        };

        let mut node = &mut root;
        for segment in parents {
            node = node.child_dir(segment);
        }

        node.children
            .push(TreeNode::new(leaf.clone(), Some(&file.action)));
    }

    root
}

fn paint(action: &PlannedAction, text: &str) -> ColoredString {
    match action {
        PlannedAction::Create => text.green(),
        PlannedAction::Skip(_) => text.yellow(),
        PlannedAction::Overwrite => text.cyan(),
        PlannedAction::Reject(_) => text.red(),
    }
}

/// Print the tree with a nice ASCII style.
fn write_tree<W: Write>(
    out: &mut W,
    node: &TreeNode<'_>,
    prefix: &str,
    is_last: bool,
) -> io::Result<()> {
    let connector = if is_last { "└── " } else { "├── " };

    match node.action {
        None => writeln!(out, "{}{}", format!("{}{}", prefix, connector).yellow(), node.name.blue())?,
        Some(action) => {
            let note = match action {
                PlannedAction::Reject(error) => format!(" ({}: {})", action.label(), error),
                _ => format!(" ({})", action.label()),
            };

            writeln!(
                out,
                "{}{}{}",
                format!("{}{}", prefix, connector).yellow(),
                paint(action, &node.name),
                note.dimmed()
            )?;
        }
    }

    let child_prefix = if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let len = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        write_tree(out, child, &child_prefix, i == len - 1)?;
    }

    Ok(())
}

/// Writes the planned scaffold under `destination` as a tree, one marker per file.
pub fn preview_as_tree<W: Write>(
    out: &mut W,
    planned: &[PlannedFile],
    destination: &Path,
) -> io::Result<()> {
    let tree_root = build_tree(planned, destination);

    writeln!(
        out,
        "Legend: {} = (directory), {} = create, {} = skip, {} = overwrite, {} = reject",
        "blue".blue(),
        "green".green(),
        "yellow".yellow(),
        "cyan".cyan(),
        "red".red()
    )?;

    writeln!(
        out,
        "{} {}\n",
        "┌─".bold().bright_blue(),
        "Preview".bold().bright_blue()
    )?;

    write_tree(out, &tree_root, "", true)?;

    writeln!(
        out,
        "\n{} {}",
        "└─".bold().bright_blue(),
        "Dry run: nothing was written".bright_green()
    )
}
