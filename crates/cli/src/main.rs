//! `rentgate`: operator tooling for the authorization catalog.
//!
//! Exports the role catalog for client-side UI gating, prints role grants,
//! explains a single decision for a simulated member, and prints the
//! directory schema.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rentgate_auth::{
    Membership, MembershipStatus, PermissionEvaluator, ResourceScope, Role, RoleCatalog, RoleName,
    Statement, StatementRegistry, Subject,
};
use rentgate_core::{GlobalRole, OrganizationId, TeamId, User, UserId};

#[derive(Parser, Debug)]
#[command(name = "rentgate", version, about, long_about = None)]
struct Args {
    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the versioned catalog snapshot (statements and every role's grants).
    Catalog,

    /// Print the statements a role grants.
    Grants {
        /// Role name, e.g. `caretaker`.
        role: String,
    },

    /// Explain the decision for a simulated member of a fresh organization.
    Check {
        /// Membership role name; names outside the catalog are allowed.
        #[arg(long)]
        role: String,

        /// Statement as `resource:action`, e.g. `property:delete`.
        statement: String,

        /// Membership status.
        #[arg(long, default_value = "active")]
        status: String,

        /// Act as a global administrator.
        #[arg(long)]
        admin: bool,

        /// Act as the organization owner.
        #[arg(long)]
        org_owner: bool,

        /// The subject owns (or caretakes) the resource.
        #[arg(long)]
        resource_owner: bool,

        /// Put the member and the resource in different teams.
        #[arg(long)]
        other_team: bool,

        /// Put the resource in another organization.
        #[arg(long)]
        other_organization: bool,
    },

    /// Print the Postgres directory schema.
    Schema,
}

/// Simulation knobs for `check`.
#[derive(Debug, Default, Clone, Copy)]
struct Situation {
    admin: bool,
    org_owner: bool,
    resource_owner: bool,
    other_team: bool,
    other_organization: bool,
}

fn main() -> Result<()> {
    rentgate_observability::init();

    let args = Args::parse();
    let catalog = RoleCatalog::standard().context("built-in role catalog is invalid")?;
    let registry = StatementRegistry::standard();

    let output = match args.command {
        Command::Catalog => to_json(&catalog.snapshot(registry), args.pretty)?,
        Command::Grants { role } => grants(&catalog, &role)?,
        Command::Check {
            role,
            statement,
            status,
            admin,
            org_owner,
            resource_owner,
            other_team,
            other_organization,
        } => {
            let situation = Situation {
                admin,
                org_owner,
                resource_owner,
                other_team,
                other_organization,
            };
            check(catalog, &role, &statement, &status, situation, args.pretty)?
        }
        Command::Schema => rentgate_infra::directory::postgres::SCHEMA.to_string(),
    };

    println!("{output}");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn grants(catalog: &RoleCatalog, role: &str) -> Result<String> {
    let role: Role = role.parse()?;
    let grants = catalog
        .grants_for_role(role)
        .with_context(|| format!("role '{role}' has no grants"))?;

    let lines: Vec<String> = grants
        .iter()
        .flat_map(|(rt, actions)| actions.iter().map(move |a| Statement::new(*rt, *a).to_string()))
        .collect();
    Ok(lines.join("\n"))
}

fn check(
    catalog: RoleCatalog,
    role: &str,
    statement: &str,
    status: &str,
    situation: Situation,
    pretty: bool,
) -> Result<String> {
    let statement: Statement = statement.parse()?;
    let status: MembershipStatus = status.parse()?;
    if !StatementRegistry::standard().contains(&statement) {
        anyhow::bail!("'{statement}' is not a registered statement");
    }

    let org = OrganizationId::new();
    let mut user = User::new(UserId::new(), "simulated@rentgate.invalid")?;
    if situation.admin {
        user = user.with_global_role(GlobalRole::Admin);
    }

    let mut membership =
        Membership::active(user.id, org, RoleName::new(role.to_string())).with_status(status);
    if situation.other_team {
        membership = membership.in_team(TeamId::new());
    }

    let owner = if situation.org_owner { user.id } else { UserId::new() };
    let subject = Subject::new(&user, org)
        .with_membership(Some(membership))
        .with_organization_owner(Some(owner));

    let resource_org = if situation.other_organization {
        OrganizationId::new()
    } else {
        org
    };
    let mut scope = ResourceScope::organization(resource_org);
    if situation.other_team {
        scope = scope.with_team(Some(TeamId::new()));
    }
    if situation.resource_owner {
        scope = scope.owned_by(user.id);
    }

    let evaluator = PermissionEvaluator::new(Arc::new(catalog));
    let explanation = evaluator.explain(&subject, statement.action, statement.resource_type, &scope);
    tracing::debug!(reason = %explanation.decision.reason, "simulated decision");
    to_json(&explanation, pretty)
}
