use std::path::{Path, PathBuf};

use crate::maven::coordinates::{ArtifactIdentifier, GroupArtifact};
use crate::maven::metadata_xml::SnapshotFileDescriptor;

const METADATA_FILE_NAME: &str = "maven-metadata.xml";
const DOCUMENTATION_EXTENSION: &str = "jar";

fn group_path(group_id: &str) -> String {
    group_id.replace('.', "/")
}

/// `<group>/<artifact>/maven-metadata.xml`, listing versions and the 'latest' / 'release' markers
pub fn artifact_metadata_path(group_artifact: &GroupArtifact) -> String {
    format!(
        "{}/{}/{}",
        group_path(&group_artifact.group_id),
        group_artifact.artifact_id,
        METADATA_FILE_NAME,
    )
}

/// `<group>/<artifact>/<version>/maven-metadata.xml`, which describes the files of a snapshot
pub fn version_metadata_path(artifact: &ArtifactIdentifier) -> String {
    format!(
        "{}/{}/{}/{}",
        group_path(artifact.group_id()),
        artifact.artifact_id(),
        artifact.version(),
        METADATA_FILE_NAME,
    )
}

fn classifier_suffix(classifier: Option<&str>) -> String {
    match classifier {
        None => "".to_string(),
        Some(c) => format!("-{}", c),
    }
}

/// File name of a documentation jar with a fixed version: `<artifact>-<version>[-<classifier>].jar`.
///  This is also the best-effort name for snapshots without usable metadata.
pub fn release_file_name(artifact: &ArtifactIdentifier) -> String {
    format!(
        "{}-{}{}.{}",
        artifact.artifact_id(),
        artifact.version(),
        classifier_suffix(artifact.classifier()),
        DOCUMENTATION_EXTENSION,
    )
}

pub fn snapshot_file_name(artifact: &ArtifactIdentifier, descriptor: &SnapshotFileDescriptor) -> String {
    match descriptor {
        SnapshotFileDescriptor::Listed { value, classifier, extension } => {
            format!(
                "{}-{}{}.{}",
                artifact.artifact_id(),
                value,
                classifier_suffix(classifier.as_deref()),
                extension,
            )
        }
        SnapshotFileDescriptor::Timestamped { timestamp, build_number } => {
            format!(
                "{}-{}-{}-{}{}.{}",
                artifact.artifact_id(),
                artifact.base_version(),
                timestamp,
                build_number,
                classifier_suffix(artifact.classifier()),
                DOCUMENTATION_EXTENSION,
            )
        }
    }
}

/// `<group path>/<artifact>/<version>/<file name>`
pub fn remote_file_path(artifact: &ArtifactIdentifier, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        group_path(artifact.group_id()),
        artifact.artifact_id(),
        artifact.version(),
        file_name,
    )
}

/// `<root>/<group>/<artifact>/<version>/<classifier>.jar`. Unclassified artifacts are stored as
///  `<artifact>-<version>.jar` in the same directory.
pub fn local_file_path(root: &Path, artifact: &ArtifactIdentifier) -> PathBuf {
    let file_name = match artifact.classifier() {
        Some(c) => format!("{}.{}", c, DOCUMENTATION_EXTENSION),
        None => format!("{}-{}.{}", artifact.artifact_id(), artifact.version(), DOCUMENTATION_EXTENSION),
    };

    let mut result = root.to_path_buf();
    result.push(artifact.group_id());
    result.push(artifact.artifact_id());
    result.push(artifact.version());
    result.push(file_name);
    result
}
