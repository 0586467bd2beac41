//! # CLI Command Implementations

use super::{Context, MementoFormat};
use mnemo_core::{
    AdapterId, AdapterView, FieldKind, LoadedObjects, Memento, Metamodel, MnemoError, Oid,
    Session, Value, memento_digest, memento_from_bytes, memento_to_bytes,
    primitives::MAX_MEMENTO_PAYLOAD_SIZE,
};
use serde_json::json;
use std::path::Path;

// =============================================================================
// FILE HELPERS
// =============================================================================

fn read_memento_file(path: &Path, format: MementoFormat) -> Result<Memento, MnemoError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MnemoError::IoError(format!("Cannot read file metadata: {}", e)))?;
    let max = u64::try_from(MAX_MEMENTO_PAYLOAD_SIZE).unwrap_or(u64::MAX);
    if metadata.len() > max {
        return Err(MnemoError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max
        )));
    }

    let data =
        std::fs::read(path).map_err(|e| MnemoError::IoError(format!("Read file: {}", e)))?;
    match format {
        MementoFormat::Binary => memento_from_bytes(&data),
        MementoFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| MnemoError::SerializationError(e.to_string())),
    }
}

fn encode_memento(memento: &Memento, format: MementoFormat) -> Result<Vec<u8>, MnemoError> {
    match format {
        MementoFormat::Binary => memento_to_bytes(memento),
        MementoFormat::Json => serde_json::to_vec_pretty(memento)
            .map_err(|e| MnemoError::SerializationError(e.to_string())),
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Text(s) => json!(s),
    }
}

/// Open the store named by the context with the configured metamodel.
pub fn open_session(ctx: &Context) -> Result<Session, MnemoError> {
    let metamodel = ctx.config.to_registry()?;
    Session::with_redb(&ctx.database, metamodel)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new object database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), MnemoError> {
    if ctx.database.exists() {
        if !force {
            return Err(MnemoError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| MnemoError::IoError(format!("Remove database: {}", e)))?;
    }

    let _session = open_session(ctx)?;
    if !ctx.quiet {
        println!("Initialized new object store at {:?}", ctx.database);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store and schema status.
pub fn cmd_status(ctx: &Context) -> Result<(), MnemoError> {
    let session = open_session(ctx)?;
    let oids: Vec<u64> = session.stored_oids().iter().map(|o| o.0).collect();
    let types: Vec<&str> = session
        .metamodel()
        .types()
        .map(|t| t.name.as_str())
        .collect();

    if ctx.json_mode {
        print_json(&json!({
            "database": ctx.database.to_string_lossy(),
            "object_count": oids.len(),
            "oids": oids,
            "types": types,
        }));
        return Ok(());
    }

    println!("Mnemo Store Status");
    println!("==================");
    println!("Database: {:?}", ctx.database);
    println!("Types:    {}", types.join(", "));
    println!("Objects:  {}", oids.len());
    if !oids.is_empty() {
        println!("Oids:     {:?}", oids);
    }
    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Store a team with two members and print the assigned Oids.
///
/// Requires the `Team`/`Person` types of the default schema.
pub fn cmd_seed(ctx: &Context) -> Result<(), MnemoError> {
    let mut session = open_session(ctx)?;

    let team = session.create_transient("Team")?;
    session.set_value(team, "name", "Red")?;
    let mut members = Vec::new();
    for name in ["Fred", "John"] {
        let person = session.create_transient("Person")?;
        session.set_value(person, "name", name)?;
        session.set_reference(person, "team", Some(team))?;
        session.push_element(team, "members", person)?;
        members.push(person);
    }
    let team_oid = session.make_persistent(team)?;

    let member_oids = members
        .iter()
        .map(|m| session.oid(*m)?.ok_or(MnemoError::UnknownAdapter(*m)))
        .collect::<Result<Vec<Oid>, MnemoError>>()?;
    tracing::info!(team = %team_oid, members = member_oids.len(), "seeded sample graph");

    if ctx.json_mode {
        print_json(&json!({
            "team": team_oid.0,
            "members": member_oids.iter().map(|o| o.0).collect::<Vec<_>>(),
        }));
    } else if !ctx.quiet {
        println!("Team: {}", team_oid);
        for oid in &member_oids {
            println!("  member {}", oid);
        }
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

fn oid_json(session: &Session, id: AdapterId) -> Result<serde_json::Value, MnemoError> {
    Ok(match session.oid(id)? {
        Some(oid) => json!(oid.0),
        None => serde_json::Value::Null,
    })
}

/// Load an object and print its fields in metamodel order.
pub fn cmd_show(ctx: &Context, oid: u64) -> Result<(), MnemoError> {
    let mut session = open_session(ctx)?;
    let id = session.load(Oid(oid))?;
    let type_name = session.type_name(id)?.to_string();

    let mut fields = serde_json::Map::new();
    for spec in session.metamodel().fields_of(&type_name)? {
        let entry = match spec.kind {
            FieldKind::Value => value_json(session.value(id, &spec.name)?),
            FieldKind::OneToOne => match session.reference(id, &spec.name)? {
                Some(target) => oid_json(&session, target)?,
                None => serde_json::Value::Null,
            },
            FieldKind::OneToMany => session
                .collection(id, &spec.name)?
                .iter()
                .map(|e| oid_json(&session, *e))
                .collect::<Result<Vec<_>, _>>()?
                .into(),
        };
        fields.insert(spec.name.clone(), entry);
    }

    if ctx.json_mode {
        print_json(&json!({
            "oid": oid,
            "type": type_name,
            "state": session.state(id)?.name(),
            "fields": fields,
        }));
        return Ok(());
    }

    println!("{} {}", type_name, oid);
    for (name, entry) in &fields {
        println!("  {} = {}", name, entry);
    }
    Ok(())
}

// =============================================================================
// CAPTURE COMMAND
// =============================================================================

/// Capture a stored object into a memento file.
pub fn cmd_capture(
    ctx: &Context,
    oid: u64,
    output: &Path,
    format: MementoFormat,
) -> Result<(), MnemoError> {
    let mut session = open_session(ctx)?;
    let id = session.load(Oid(oid))?;
    let memento = session.capture(id)?;

    let data = encode_memento(&memento, format)?;
    std::fs::write(output, &data)
        .map_err(|e| MnemoError::IoError(format!("Write file: {}", e)))?;
    let digest = memento_digest(&memento)?;

    if ctx.json_mode {
        print_json(&json!({
            "oid": oid,
            "objects": memento.object_count(),
            "bytes": data.len(),
            "digest": digest,
            "output": output.to_string_lossy(),
        }));
    } else if !ctx.quiet {
        println!(
            "Captured {} {} into {:?} ({} bytes)",
            memento.type_name(),
            oid,
            output,
            data.len()
        );
        println!("Digest: {}", digest);
    }
    Ok(())
}

// =============================================================================
// RECREATE COMMAND
// =============================================================================

/// Rebuild a memento file's graph and write it to the store.
///
/// A persistent root overwrites the stored record under its Oid. A transient
/// root and its nested transients are made persistent with fresh Oids.
pub fn cmd_recreate(ctx: &Context, input: &Path, format: MementoFormat) -> Result<(), MnemoError> {
    let memento = read_memento_file(input, format)?;
    let mut session = open_session(ctx)?;

    let mut loaded = LoadedObjects::new();
    let root = session.recreate(&memento, &mut loaded)?;
    let oid = session.save(root)?;
    tracing::info!(%oid, objects = memento.object_count(), "recreated memento");

    if ctx.json_mode {
        print_json(&json!({
            "oid": oid.0,
            "type": memento.type_name(),
            "was_transient": memento.is_transient(),
            "objects": memento.object_count(),
        }));
    } else if !ctx.quiet {
        println!("Recreated {} as {}", memento.type_name(), oid);
    }
    Ok(())
}

// =============================================================================
// DESTROY COMMAND
// =============================================================================

/// Delete a stored object. References to it become hanging.
pub fn cmd_destroy(ctx: &Context, oid: u64) -> Result<(), MnemoError> {
    let mut session = open_session(ctx)?;
    if !session.destroy(Oid(oid))? {
        return Err(MnemoError::UnknownIdentity(Oid(oid)));
    }

    if ctx.json_mode {
        print_json(&json!({ "destroyed": oid }));
    } else if !ctx.quiet {
        println!("Destroyed {}", oid);
    }
    Ok(())
}
