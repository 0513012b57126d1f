//! Hierarchy resolver
//!
//! Collects every hierarchy name referenced by a job, then resolves each level
//! (department, major, class, work department) with one bulk lookup, one bulk
//! insert for the missing names and one lookup of the inserted ids. The result
//! is an immutable [`HierarchySnapshot`] that import batches only read.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::config::HierarchyPolicy;
use crate::entity::{class, department, major, work_department, NAME_MAX_LEN};

use super::error::ImportError;
use super::validator::{Placement, ValidRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Department,
    Major,
    Class,
    WorkDepartment,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Department => "department",
            Level::Major => "major",
            Level::Class => "class",
            Level::WorkDepartment => "work department",
        };
        f.write_str(name)
    }
}

/// Whether a name came from the file or from the default-entity policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Declared,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MajorDecl {
    /// `None` falls back to the policy's default department
    pub department: Option<String>,
    pub origin: Origin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDecl {
    /// `None` falls back to the policy's default major
    pub major: Option<String>,
    /// Department named by the record; scopes the default major
    pub department: Option<String>,
}

impl ClassDecl {
    fn parent_label(&self) -> &str {
        self.major
            .as_deref()
            .or(self.department.as_deref())
            .unwrap_or("-")
    }
}

/// Distinct hierarchy names referenced by a job, grouped by level.
///
/// When a name is declared twice with different parents the first declaration
/// in input order is kept and the conflict is logged. Default parents are not
/// part of the demand: the resolver adds them only for names it has to create.
#[derive(Clone, Debug, Default)]
pub struct HierarchyDemand {
    pub departments: BTreeSet<String>,
    pub majors: BTreeMap<String, MajorDecl>,
    pub classes: BTreeMap<String, ClassDecl>,
    pub work_departments: BTreeSet<String>,
}

impl HierarchyDemand {
    pub fn from_records(records: &[ValidRecord]) -> Self {
        let mut demand = Self::default();

        for record in records {
            match &record.placement {
                Placement::Class(path) => {
                    let department = path.department();
                    if let Some(dept) = department {
                        demand.departments.insert(dept.to_string());
                    }
                    if let Some(major) = path.major() {
                        demand.add_major(major, department, record.row);
                    }

                    let decl = ClassDecl {
                        major: path.major().map(str::to_string),
                        department: department.map(str::to_string),
                    };
                    demand.add_class(path.class_name(), decl, record.row);
                }
                Placement::Department(name) => {
                    demand.departments.insert(name.clone());
                }
                Placement::WorkDepartment(name) => {
                    demand.work_departments.insert(name.clone());
                }
            }
        }

        demand
    }

    fn add_major(&mut self, name: &str, department: Option<&str>, row: usize) {
        let decl = self.majors.entry(name.to_string()).or_insert_with(|| MajorDecl {
            department: department.map(str::to_string),
            origin: Origin::Declared,
        });

        if let (Some(kept), Some(new)) = (decl.department.as_deref(), department) {
            if kept != new {
                tracing::warn!(
                    "Row {}: major '{}' declared under department '{}', keeping first declaration '{}'",
                    row,
                    name,
                    new,
                    kept
                );
            }
        } else if decl.department.is_none() && department.is_some() {
            decl.department = department.map(str::to_string);
        }
    }

    fn add_class(&mut self, name: &str, decl: ClassDecl, row: usize) {
        match self.classes.get(name) {
            None => {
                self.classes.insert(name.to_string(), decl);
            }
            Some(kept) if kept.parent_label() != decl.parent_label() => {
                tracing::warn!(
                    "Row {}: class '{}' declared under '{}', keeping first declaration '{}'",
                    row,
                    name,
                    decl.parent_label(),
                    kept.parent_label()
                );
            }
            Some(_) => {}
        }
    }

    /// Declared majors plus the default majors of classes that have to be
    /// created without a declared major
    fn majors_with_defaults(
        &self,
        existing_classes: &HashMap<String, i64>,
        policy: &HierarchyPolicy,
    ) -> BTreeMap<String, MajorDecl> {
        let mut majors = self.majors.clone();
        for (name, decl) in &self.classes {
            if decl.major.is_some() || existing_classes.contains_key(name) {
                continue;
            }
            if let Some(default) = policy.default_major_for(decl.department.as_deref()) {
                majors.entry(default).or_insert_with(|| MajorDecl {
                    department: decl.department.clone(),
                    origin: Origin::Default,
                });
            }
        }
        majors
    }
}

/// Entities created while resolving one job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreatedCounts {
    pub departments: usize,
    pub majors: usize,
    pub classes: usize,
    pub work_departments: usize,
}

/// Name → id maps produced once per job and shared read-only with batches
#[derive(Clone, Debug, Default)]
pub struct HierarchySnapshot {
    pub departments: HashMap<String, i64>,
    pub majors: HashMap<String, i64>,
    pub classes: HashMap<String, i64>,
    pub work_departments: HashMap<String, i64>,
    /// Names that could not be resolved, with the reason
    pub unresolved: HashMap<(Level, String), String>,
    pub created: CreatedCounts,
}

impl HierarchySnapshot {
    pub fn department_id(&self, name: &str) -> Result<i64, String> {
        self.lookup(Level::Department, &self.departments, name)
    }

    pub fn class_id(&self, name: &str) -> Result<i64, String> {
        self.lookup(Level::Class, &self.classes, name)
    }

    pub fn work_department_id(&self, name: &str) -> Result<i64, String> {
        self.lookup(Level::WorkDepartment, &self.work_departments, name)
    }

    fn lookup(&self, level: Level, map: &HashMap<String, i64>, name: &str) -> Result<i64, String> {
        map.get(name)
            .copied()
            .ok_or_else(|| self.reason_or(level, name))
    }

    fn mark_unresolved(&mut self, level: Level, name: &str, reason: String) {
        tracing::warn!("Unresolved {} '{}': {}", level, name, reason);
        self.unresolved.insert((level, name.to_string()), reason);
    }

    fn reason_or(&self, level: Level, name: &str) -> String {
        self.unresolved
            .get(&(level, name.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("{} '{}' not found", level, name))
    }
}

/// Resolve every name in `demand`, creating what is missing.
///
/// Levels run in dependency order so each child sees its parents' ids. Class
/// names are looked up first because only missing classes may pull in a
/// default major. Names whose parent cannot be resolved are recorded in
/// [`HierarchySnapshot::unresolved`]; unrelated branches still resolve.
pub async fn resolve<C: ConnectionTrait>(
    conn: &C,
    demand: &HierarchyDemand,
    policy: &HierarchyPolicy,
) -> Result<HierarchySnapshot, ImportError> {
    let mut snapshot = HierarchySnapshot::default();

    let class_names: Vec<String> = demand.classes.keys().cloned().collect();
    snapshot.classes = fetch_classes(conn, class_names).await?;
    let majors = demand.majors_with_defaults(&snapshot.classes, policy);

    resolve_departments(conn, demand, &mut snapshot).await?;
    resolve_majors(conn, &majors, policy, &mut snapshot).await?;
    resolve_classes(conn, demand, policy, &mut snapshot).await?;
    resolve_work_departments(conn, demand, &mut snapshot).await?;

    let created = snapshot.created;
    tracing::info!(
        "Hierarchy resolved: created {} departments, {} majors, {} classes, {} work departments; {} unresolved",
        created.departments,
        created.majors,
        created.classes,
        created.work_departments,
        snapshot.unresolved.len()
    );

    Ok(snapshot)
}

async fn resolve_departments<C: ConnectionTrait>(
    conn: &C,
    demand: &HierarchyDemand,
    snapshot: &mut HierarchySnapshot,
) -> Result<(), DbErr> {
    let names: Vec<String> = demand.departments.iter().cloned().collect();
    snapshot.departments = fetch_departments(conn, names.clone()).await?;

    let to_create: Vec<String> = names
        .into_iter()
        .filter(|name| !snapshot.departments.contains_key(name))
        .collect();

    if !to_create.is_empty() {
        let models = to_create.iter().map(|name| department::ActiveModel {
            name: Set(name.clone()),
            ..Default::default()
        });
        department::Entity::insert_many(models).exec_without_returning(conn).await?;

        snapshot.created.departments = to_create.len();
        snapshot.departments.extend(fetch_departments(conn, to_create).await?);
    }

    Ok(())
}

fn too_long(level: Level, name: &str) -> Option<String> {
    (name.chars().count() > NAME_MAX_LEN)
        .then(|| format!("{} name '{}' longer than {} characters", level, name, NAME_MAX_LEN))
}

/// Look up the default department, creating it when the policy allows
async fn ensure_default_department<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    policy: &HierarchyPolicy,
    snapshot: &mut HierarchySnapshot,
) -> Result<(), DbErr> {
    if snapshot.departments.contains_key(name) {
        return Ok(());
    }
    if let Some(id) = fetch_departments(conn, vec![name.to_string()]).await?.remove(name) {
        snapshot.departments.insert(name.to_string(), id);
        return Ok(());
    }
    if !policy.create_defaults {
        snapshot.mark_unresolved(
            Level::Department,
            name,
            format!("default department '{}' does not exist", name),
        );
        return Ok(());
    }
    if let Some(reason) = too_long(Level::Department, name) {
        snapshot.mark_unresolved(Level::Department, name, reason);
        return Ok(());
    }

    let model = department::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    };
    let id = department::Entity::insert(model).exec(conn).await?.last_insert_id;
    tracing::info!("Created default department '{}'", name);
    snapshot.departments.insert(name.to_string(), id);
    snapshot.created.departments += 1;
    Ok(())
}

async fn resolve_majors<C: ConnectionTrait>(
    conn: &C,
    majors: &BTreeMap<String, MajorDecl>,
    policy: &HierarchyPolicy,
    snapshot: &mut HierarchySnapshot,
) -> Result<(), DbErr> {
    let names: Vec<String> = majors.keys().cloned().collect();
    snapshot.majors = fetch_majors(conn, names).await?;

    let missing: Vec<(&String, &MajorDecl)> = majors
        .iter()
        .filter(|(name, _)| !snapshot.majors.contains_key(*name))
        .collect();

    if missing.iter().any(|(_, decl)| decl.department.is_none()) {
        if let Some(fallback) = policy.department_fallback() {
            ensure_default_department(conn, fallback, policy, snapshot).await?;
        }
    }

    let mut to_create = Vec::new();
    for (name, decl) in missing {
        // Only generated default names can be this wide; file values are validated
        if let Some(reason) = too_long(Level::Major, name) {
            snapshot.mark_unresolved(Level::Major, name, reason);
            continue;
        }
        if decl.origin == Origin::Default && !policy.create_defaults {
            snapshot.mark_unresolved(
                Level::Major,
                name,
                format!("default major '{}' does not exist", name),
            );
            continue;
        }

        let parent = decl.department.as_deref().or(policy.department_fallback());
        let Some(parent) = parent else {
            snapshot.mark_unresolved(
                Level::Major,
                name,
                format!(
                    "major '{}' has no department and no default department is configured",
                    name
                ),
            );
            continue;
        };

        match snapshot.departments.get(parent) {
            Some(&department_id) => to_create.push((name.clone(), department_id)),
            None => {
                let reason = snapshot.reason_or(Level::Department, parent);
                snapshot.mark_unresolved(Level::Major, name, reason);
            }
        }
    }

    if !to_create.is_empty() {
        let models = to_create.iter().map(|(name, department_id)| major::ActiveModel {
            name: Set(name.clone()),
            department_id: Set(*department_id),
            ..Default::default()
        });
        major::Entity::insert_many(models).exec_without_returning(conn).await?;

        snapshot.created.majors = to_create.len();
        let created: Vec<String> = to_create.into_iter().map(|(name, _)| name).collect();
        snapshot.majors.extend(fetch_majors(conn, created).await?);
    }

    Ok(())
}

/// Create the classes missing from the snapshot. Existing classes were
/// fetched up front by [`resolve`].
async fn resolve_classes<C: ConnectionTrait>(
    conn: &C,
    demand: &HierarchyDemand,
    policy: &HierarchyPolicy,
    snapshot: &mut HierarchySnapshot,
) -> Result<(), DbErr> {
    let mut to_create = Vec::new();
    for (name, decl) in &demand.classes {
        if snapshot.classes.contains_key(name) {
            continue;
        }

        let parent = decl
            .major
            .clone()
            .or_else(|| policy.default_major_for(decl.department.as_deref()));
        let Some(parent) = parent else {
            snapshot.mark_unresolved(
                Level::Class,
                name,
                format!("class '{}' has no major and no default major is configured", name),
            );
            continue;
        };

        match snapshot.majors.get(&parent) {
            Some(&major_id) => to_create.push((name.clone(), major_id)),
            None => {
                let reason = snapshot.reason_or(Level::Major, &parent);
                snapshot.mark_unresolved(Level::Class, name, reason);
            }
        }
    }

    if !to_create.is_empty() {
        let models = to_create.iter().map(|(name, major_id)| class::ActiveModel {
            name: Set(name.clone()),
            major_id: Set(*major_id),
            ..Default::default()
        });
        class::Entity::insert_many(models).exec_without_returning(conn).await?;

        snapshot.created.classes = to_create.len();
        let created: Vec<String> = to_create.into_iter().map(|(name, _)| name).collect();
        snapshot.classes.extend(fetch_classes(conn, created).await?);
    }

    Ok(())
}

async fn resolve_work_departments<C: ConnectionTrait>(
    conn: &C,
    demand: &HierarchyDemand,
    snapshot: &mut HierarchySnapshot,
) -> Result<(), DbErr> {
    let names: Vec<String> = demand.work_departments.iter().cloned().collect();
    snapshot.work_departments = fetch_work_departments(conn, names.clone()).await?;

    let to_create: Vec<String> = names
        .into_iter()
        .filter(|name| !snapshot.work_departments.contains_key(name))
        .collect();

    if !to_create.is_empty() {
        let models = to_create.iter().map(|name| work_department::ActiveModel {
            name: Set(name.clone()),
            ..Default::default()
        });
        work_department::Entity::insert_many(models).exec_without_returning(conn).await?;

        snapshot.created.work_departments = to_create.len();
        snapshot
            .work_departments
            .extend(fetch_work_departments(conn, to_create).await?);
    }

    Ok(())
}

async fn fetch_departments<C: ConnectionTrait>(
    conn: &C,
    names: Vec<String>,
) -> Result<HashMap<String, i64>, DbErr> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = department::Entity::find()
        .filter(department::Column::Name.is_in(names))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|d| (d.name, d.id)).collect())
}

async fn fetch_majors<C: ConnectionTrait>(
    conn: &C,
    names: Vec<String>,
) -> Result<HashMap<String, i64>, DbErr> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = major::Entity::find()
        .filter(major::Column::Name.is_in(names))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|m| (m.name, m.id)).collect())
}

async fn fetch_classes<C: ConnectionTrait>(
    conn: &C,
    names: Vec<String>,
) -> Result<HashMap<String, i64>, DbErr> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = class::Entity::find()
        .filter(class::Column::Name.is_in(names))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|c| (c.name, c.id)).collect())
}

async fn fetch_work_departments<C: ConnectionTrait>(
    conn: &C,
    names: Vec<String>,
) -> Result<HashMap<String, i64>, DbErr> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = work_department::Entity::find()
        .filter(work_department::Column::Name.is_in(names))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|w| (w.name, w.id)).collect())
}
