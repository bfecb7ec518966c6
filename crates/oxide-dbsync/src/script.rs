//! Final script assembly.
//!
//! The table blocks are wrapped with session settings that disable unique
//! and foreign key checks while the script runs, and restore them afterwards.

/// Session settings ahead of the table blocks.
const HEADER: &[&str] = &[
    "/*!40101 SET NAMES utf8 */;",
    "",
    "/*!40101 SET SQL_MODE=''*/;",
    "",
    "/*!40014 SET @OLD_UNIQUE_CHECKS=@@UNIQUE_CHECKS, UNIQUE_CHECKS=0 */;",
    "/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;",
    "/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;",
    "/*!40111 SET @OLD_SQL_NOTES=@@SQL_NOTES, SQL_NOTES=0 */;",
    "",
];

/// Restores the settings changed by [`HEADER`].
const FOOTER: &[&str] = &[
    "/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;",
    "/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;",
    "/*!40014 SET UNIQUE_CHECKS=@OLD_UNIQUE_CHECKS */;",
    "/*!40111 SET SQL_NOTES=@OLD_SQL_NOTES */;",
    "\n",
];

/// Wraps the rendered table blocks into the final script.
///
/// Returns an empty string when there is nothing to synchronize.
#[must_use]
pub fn assemble(blocks: &str) -> String {
    if blocks.is_empty() {
        return String::new();
    }
    HEADER
        .iter()
        .copied()
        .chain(std::iter::once(blocks))
        .chain(FOOTER.iter().copied())
        .collect::<Vec<_>>()
        .join("\n")
}
