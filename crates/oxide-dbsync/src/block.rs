//! Per-table output blocks.

use std::fmt::Write as _;

use crate::reconciler::RowChanges;

/// Every statement produced for one table.
///
/// A block is rendered and appended to the shared output in one piece, so
/// statements of different tables never interleave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBlock {
    /// Table name, used in the marker comment.
    pub table: String,
    /// `CREATE TABLE` for a table only the source has.
    pub create: Option<String>,
    /// `DROP TABLE` for a table only the target has.
    pub drop: Option<String>,
    /// `TRUNCATE TABLE` ahead of a full dump.
    pub truncate: Option<String>,
    /// The combined `ALTER TABLE`.
    pub alter: Option<String>,
    /// Row deletions.
    pub delete: Vec<String>,
    /// Row updates.
    pub update: Vec<String>,
    /// Multi-row insert.
    pub insert: Option<String>,
}

impl OutputBlock {
    /// Creates an empty block for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Merges the row statements of a reconciliation.
    pub fn rows(&mut self, changes: RowChanges) {
        self.truncate = changes.truncate;
        self.delete = changes.delete;
        self.update = changes.update;
        self.insert = changes.insert;
    }

    /// Returns true if no statement was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements().next().is_none()
    }

    /// Statements in emission order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.create
            .iter()
            .chain(&self.drop)
            .chain(&self.truncate)
            .chain(&self.alter)
            .chain(&self.delete)
            .chain(&self.update)
            .chain(&self.insert)
            .map(String::as_str)
    }

    /// Renders the block: marker comment, one statement per line, then a
    /// blank line. An empty block renders to nothing.
    #[must_use]
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = format!("/* SYNC TABLE : `{}` */\n", self.table);
        for statement in self.statements() {
            let _ = writeln!(out, "{statement};");
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_renders_nothing() {
        let block = OutputBlock::new("users");
        assert!(block.is_empty());
        assert_eq!(block.render(), "");
    }

    #[test]
    fn test_render_order() {
        let mut block = OutputBlock::new("users");
        block.alter = Some("ALTER TABLE `users` ENGINE=InnoDB".to_string());
        block.rows(RowChanges {
            truncate: None,
            delete: vec!["DELETE FROM `users` WHERE `id`='3'".to_string()],
            update: vec!["UPDATE `users` SET `name`='z' WHERE `id`='1'".to_string()],
            insert: Some("INSERT INTO `users` (`id`,`name`) VALUES ('2','b')".to_string()),
        });
        assert_eq!(
            block.render(),
            "/* SYNC TABLE : `users` */\n\
             ALTER TABLE `users` ENGINE=InnoDB;\n\
             DELETE FROM `users` WHERE `id`='3';\n\
             UPDATE `users` SET `name`='z' WHERE `id`='1';\n\
             INSERT INTO `users` (`id`,`name`) VALUES ('2','b');\n\
             \n"
        );
    }

    #[test]
    fn test_create_precedes_truncate() {
        let mut block = OutputBlock::new("t");
        block.create = Some("CREATE TABLE `t` (`id` int)".to_string());
        block.rows(RowChanges {
            insert: Some("INSERT INTO `t` VALUES ('1')".to_string()),
            ..RowChanges::default()
        });
        let statements: Vec<&str> = block.statements().collect();
        assert_eq!(
            statements,
            vec!["CREATE TABLE `t` (`id` int)", "INSERT INTO `t` VALUES ('1')"]
        );
    }
}
