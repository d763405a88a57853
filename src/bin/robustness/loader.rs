// Input loaders for the robustness runner: interaction edge list, node
// attributes, optional food-group roster. All plain CSV, no quoting support
// beyond what the source files actually use.

use std::fs;
use std::path::Path;

use foodweb_engine::DependencyGraph;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("{path}: missing required column `{column}`")]
    MissingColumn { path: String, column: String },

    #[error("{path}:{line}: expected at least {expected} fields, found {found}")]
    ShortRow {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },
}

fn read(path: &Path) -> Result<String, LoaderError> {
    fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn column_index(header: &str, name: &str, path: &Path) -> Result<usize, LoaderError> {
    header
        .split(',')
        .position(|c| c.trim() == name)
        .ok_or_else(|| LoaderError::MissingColumn {
            path: path.display().to_string(),
            column: name.to_string(),
        })
}

/// Build the dependency graph from an interaction edge list with
/// `Source_Name,Target_Name` columns. Interaction rows point consumer to
/// resource; dependency edges run the other way (resource to consumer), so
/// each row is reversed on insertion.
pub fn load_edges(path: &Path) -> Result<DependencyGraph, LoaderError> {
    let body = read(path)?;
    let mut lines = body.lines().enumerate();
    let (_, header) = lines.next().unwrap_or((0, ""));
    let source_col = column_index(header, "Source_Name", path)?;
    let target_col = column_index(header, "Target_Name", path)?;
    let width = source_col.max(target_col) + 1;

    let mut graph = DependencyGraph::new();
    for (line_idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < width {
            return Err(LoaderError::ShortRow {
                path: path.display().to_string(),
                line: line_idx + 1,
                expected: width,
                found: fields.len(),
            });
        }
        let consumer = graph.intern(fields[source_col].trim());
        let resource = graph.intern(fields[target_col].trim());
        graph.add_edge(resource, consumer);
    }
    Ok(graph)
}

/// Attach habitat tags from a `Taxon,Habitat` attribute table. The habitat
/// field holds a `;`-separated list; taxa absent from the graph are skipped.
pub fn load_attributes(path: &Path, graph: &mut DependencyGraph) -> Result<(), LoaderError> {
    let body = read(path)?;
    let mut lines = body.lines();
    let header = lines.next().unwrap_or("");
    let taxon_col = column_index(header, "Taxon", path)?;
    let habitat_col = column_index(header, "Habitat", path)?;
    let width = taxon_col.max(habitat_col) + 1;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < width {
            continue;
        }
        let Some(id) = graph.id_of(fields[taxon_col].trim()) else {
            continue;
        };
        let habitats: Vec<String> = fields[habitat_col]
            .split(';')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        graph.attrs_mut(id).habitats = habitats;
    }
    Ok(())
}

/// Mark basal food-group nodes from a plain name list, one per line.
pub fn load_food_groups(path: &Path, graph: &mut DependencyGraph) -> Result<(), LoaderError> {
    let body = read(path)?;
    for line in body.lines() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        if let Some(id) = graph.id_of(name) {
            graph.attrs_mut(id).food_group = true;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("foodweb-engine-loader-tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn edges_are_reversed_into_dependencies() {
        let path = write_temp(
            "edges.csv",
            "Source_Name,Target_Name\nPerch,Daphnia\nHeron,Perch\n",
        );
        let graph = load_edges(&path).unwrap();

        let daphnia = graph.id_of("Daphnia").unwrap();
        let perch = graph.id_of("Perch").unwrap();
        let heron = graph.id_of("Heron").unwrap();
        assert!(graph.has_edge(daphnia, perch));
        assert!(graph.has_edge(perch, heron));
        assert!(!graph.has_edge(perch, daphnia));
    }

    #[test]
    fn missing_column_is_reported() {
        let path = write_temp("bad_edges.csv", "From,To\nA,B\n");
        assert!(matches!(
            load_edges(&path),
            Err(LoaderError::MissingColumn { .. })
        ));
    }

    #[test]
    fn habitats_split_on_semicolons() {
        let edges = write_temp("attr_edges.csv", "Source_Name,Target_Name\nPerch,Daphnia\n");
        let attrs = write_temp(
            "attrs.csv",
            "Taxon,Habitat\nPerch,Lake; River\nGhost,Swamp\n",
        );
        let mut graph = load_edges(&edges).unwrap();
        load_attributes(&attrs, &mut graph).unwrap();

        let perch = graph.id_of("Perch").unwrap();
        assert_eq!(graph.attrs(perch).habitats, vec!["Lake", "River"]);
        assert!(graph.id_of("Ghost").is_none());
    }

    #[test]
    fn food_group_roster_marks_nodes() {
        let edges = write_temp("fg_edges.csv", "Source_Name,Target_Name\nSnail,Detritus\n");
        let roster = write_temp("fg.txt", "Detritus\n");
        let mut graph = load_edges(&edges).unwrap();
        load_food_groups(&roster, &mut graph).unwrap();

        let detritus = graph.id_of("Detritus").unwrap();
        let snail = graph.id_of("Snail").unwrap();
        assert!(graph.attrs(detritus).food_group);
        assert!(!graph.attrs(snail).food_group);
    }
}
