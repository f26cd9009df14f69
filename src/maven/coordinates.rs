use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::error::RepoError;

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";
pub const DEFAULT_TYPE: &str = "jar";

/// Coordinates of a documentation artifact in a Maven repository.
///
/// Equality and hashing ignore `artifact_type`: two identifiers that differ only in their type
///  refer to the same cached documentation file.
#[derive(Debug, Clone)]
pub struct ArtifactIdentifier {
    group_id: String,
    artifact_id: String,
    version: String,
    classifier: Option<String>,
    artifact_type: String,
}

impl ArtifactIdentifier {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<String>,
    ) -> Result<ArtifactIdentifier, RepoError> {
        Self::with_type(group_id, artifact_id, version, classifier, None)
    }

    pub fn with_type(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<String>,
        artifact_type: Option<String>,
    ) -> Result<ArtifactIdentifier, RepoError> {
        let group_id = group_id.into();
        let artifact_id = artifact_id.into();
        let version = version.into();

        check_segment("group id", &group_id)?;
        check_segment("artifact id", &artifact_id)?;
        check_segment("version", &version)?;

        let classifier = classifier.filter(|c| !c.is_empty());
        if let Some(c) = &classifier {
            check_segment("classifier", c)?;
        }

        let artifact_type = match artifact_type.filter(|t| !t.is_empty()) {
            Some(t) => {
                check_segment("type", &t)?;
                t
            }
            None => DEFAULT_TYPE.to_string(),
        };

        Ok(ArtifactIdentifier {
            group_id,
            artifact_id,
            version,
            classifier,
            artifact_type,
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX)
    }

    /// the version without its '-SNAPSHOT' suffix
    pub fn base_version(&self) -> &str {
        self.version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(&self.version)
    }

    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    /// The path of this artifact inside a Maven repository in the default layout, e.g.
    ///  `com/foo/bar/1.0.0/bar-1.0.0-javadoc.jar`
    pub fn repository_path(&self) -> String {
        let classifier_string = match &self.classifier {
            None => "".to_string(),
            Some(c) => format!("-{}", c),
        };

        format!(
            "{}/{}/{}/{}-{}{}.{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version,
            classifier_string,
            self.artifact_type,
        )
    }
}

impl PartialEq for ArtifactIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.version == other.version
            && self.classifier == other.classifier
    }
}
impl Eq for ArtifactIdentifier {}

impl Hash for ArtifactIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_id.hash(state);
        self.artifact_id.hash(state);
        self.version.hash(state);
        self.classifier.hash(state);
    }
}

impl Display for ArtifactIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        Ok(())
    }
}

/// Cache key for resolving symbolic versions, which are per (group, artifact)
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct GroupArtifact {
    pub group_id: String,
    pub artifact_id: String,
}
impl GroupArtifact {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> GroupArtifact {
        GroupArtifact {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }
}

impl Display for GroupArtifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Symbolic version references that are resolved through maven-metadata.xml
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MavenVersionRef {
    Latest,
    Release,
}
impl MavenVersionRef {
    /// case-insensitive, `None` for anything that is not a symbolic reference
    pub fn parse(version: &str) -> Option<MavenVersionRef> {
        if version.eq_ignore_ascii_case("latest") {
            Some(MavenVersionRef::Latest)
        }
        else if version.eq_ignore_ascii_case("release") {
            Some(MavenVersionRef::Release)
        }
        else {
            None
        }
    }

    pub fn xml_element_name(&self) -> &'static str {
        match self {
            MavenVersionRef::Latest => "latest",
            MavenVersionRef::Release => "release",
        }
    }
}

impl Display for MavenVersionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.xml_element_name())
    }
}

fn check_segment(what: &str, value: &str) -> Result<(), RepoError> {
    if value.is_empty() {
        return Err(RepoError::InvalidCoordinate(format!("{} must not be empty", what)));
    }
    if value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(RepoError::InvalidCoordinate(format!("{} {:?} is not a valid path segment", what, value)));
    }
    Ok(())
}
