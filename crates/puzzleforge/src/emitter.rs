//! Specification to program compiler.

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::Template;
use puzzleforge_sampler::CondScope;
use puzzleforge_schema::{
    Condition, CustomCond, DefinedSymbol, DerivedSymbol, DynamicCondition, OptionSet,
    OptionTemplate, Query, Specification, StaticCondition, Symbol, VarType, Variable,
};
use puzzleforge_solver::Direction;
use tracing::debug;

use crate::program::*;

/// Compiles a validated [`Specification`] into a [`Program`].
///
/// Each construct becomes exactly one instruction, in document order:
/// custom operators, variables, symbols, conditions, the solving phase,
/// queries, and finally the problem text. The same program drives both
/// generation and replay.
#[derive(Debug, Clone, Copy, Default)]
pub struct Emitter;

impl Emitter {
    pub fn emit(spec: &Specification) -> Result<Program> {
        spec.validate()?;
        let mut instructions = Vec::new();

        for (name, source) in &spec.custom_operator {
            instructions.push(Instruction::Operator {
                name: name.clone(),
                function: Formula::parse(source)?,
            });
        }
        for (name, var) in &spec.variables {
            instructions.push(Instruction::Variable(variable(name, var)?));
        }
        for (name, symbol) in &spec.symbols {
            instructions.push(match symbol {
                Symbol::Defined(def) => Instruction::Family(family(name, def)?),
                Symbol::Derived(der) => Instruction::Derive(derive(name, der)?),
                Symbol::Group(group) => Instruction::DeriveGroup(GroupRule {
                    name: name.clone(),
                    total: Formula::parse(&group.total)?,
                    templates: group
                        .templates
                        .iter()
                        .map(|t| derive(name, t))
                        .collect::<Result<_>>()?,
                }),
            });
        }
        for (name, cond) in &spec.conditions {
            instructions.push(match cond {
                Condition::Static(c) => Instruction::StaticCondition(static_rule(name, c)?),
                Condition::Dynamic(c) => Instruction::DynamicCondition(dynamic(name, c)?),
            });
        }
        instructions.push(Instruction::Solve(solve_rule(spec)?));
        for (name, query) in &spec.queries {
            instructions.push(Instruction::Query(query_rule(name, query)?));
        }
        instructions.push(Instruction::Problem(Template::parse(&spec.desc)?));

        debug!(
            event = "program_emitted",
            instructions = instructions.len(),
            queries = spec.queries.len(),
        );
        Ok(Program {
            instructions,
            max_solution: spec.max_solution,
            sym_type: sym_type(spec),
            optimizes: spec.optimize.is_some(),
        })
    }
}

fn variable(name: &str, var: &Variable) -> Result<VariableRule> {
    let source = match (&var.formula, var.var_type(), &var.domain) {
        (Some(formula), _, _) => VariableSource::Formula(Formula::parse(formula)?),
        (None, Some(VarType::Int), Some(domain)) => VariableSource::Int(Formula::parse(domain)?),
        (None, Some(VarType::Float), Some(domain)) => VariableSource::Float(Formula::parse(domain)?),
        (None, Some(VarType::Bool | VarType::Enum), domain) => VariableSource::Choice(
            domain.as_deref().map(Formula::parse).transpose()?,
        ),
        _ => {
            return Err(PuzzleError::schema(
                format!("variables.{name}"),
                "needs either a formula or a type with a domain",
            ))
        }
    };
    Ok(VariableRule {
        name: name.to_string(),
        source,
    })
}

fn family(name: &str, def: &DefinedSymbol) -> Result<FamilyRule> {
    let sorts = def.sorts().ok_or_else(|| {
        PuzzleError::schema(format!("symbols.{name}.type"), "unsupported sort")
    })?;
    Ok(FamilyRule {
        name: name.to_string(),
        sources: parse_all(&def.source)?,
        attrs: def.attr.clone(),
        sorts,
        descs: def.descs(),
        bounds: def.domain.as_deref().map(Formula::parse).transpose()?,
    })
}

fn parse_all(sources: &[String]) -> Result<Vec<Formula>> {
    sources.iter().map(|s| Formula::parse(s)).collect()
}

fn custom(conds: &[CustomCond]) -> Result<Vec<CustomRule>> {
    conds
        .iter()
        .map(|c| {
            let scope = match c.cond_scope() {
                // Option rows are single-dimension draws, so an option-scope
                // predicate prunes exactly like a dim-scope one.
                Some(CondScope::Option) | Some(CondScope::Dim) => CondScope::Dim,
                Some(CondScope::Domain) => CondScope::Domain,
                None => {
                    return Err(PuzzleError::schema(
                        "custom_cond.scope",
                        format!("unknown scope '{}'", c.scope),
                    ))
                }
            };
            Ok(CustomRule {
                scope,
                fields: c.fields.clone(),
                constraint: c.constraint.as_deref().map(Formula::parse).transpose()?,
            })
        })
        .collect()
}

fn derive(name: &str, der: &DerivedSymbol) -> Result<DeriveRule> {
    Ok(DeriveRule {
        name: name.to_string(),
        site: SamplingSite {
            sources: parse_all(&der.source)?,
            amount: der.amount.as_deref().map(parse_all).transpose()?,
            order: der.order_or_default(),
            duplicate: der.duplicate_or_default(),
            domain_cond: der.domain_cond,
            dim: der.dim,
            dim_cond: der.dim_cond.clone(),
            custom: custom(&der.custom_cond)?,
        },
        domain: der.domain.as_deref().map(Formula::parse).transpose()?,
        formula: der.formula.as_deref().map(Formula::parse).transpose()?,
        desc: Template::parse(&der.desc)?,
    })
}

fn static_rule(name: &str, cond: &StaticCondition) -> Result<StaticRule> {
    Ok(StaticRule {
        name: name.to_string(),
        formula: Formula::parse(&cond.formula)?,
        desc: cond.desc.as_deref().map(Template::parse).transpose()?,
    })
}

fn dynamic(name: &str, cond: &DynamicCondition) -> Result<DynamicRule> {
    let k = cond.source.len();
    Ok(DynamicRule {
        name: name.to_string(),
        site: SamplingSite {
            sources: parse_all(&cond.source)?,
            amount: cond.amount.as_deref().map(parse_all).transpose()?,
            order: cond.order.clone().unwrap_or_else(|| vec![true; k]),
            duplicate: cond.duplicate.clone().unwrap_or_else(|| vec![false; k]),
            domain_cond: cond.domain_cond,
            dim: 1,
            dim_cond: Vec::new(),
            custom: custom(&cond.custom_cond)?,
        },
        count: cond.domain.as_deref().map(Formula::parse).transpose()?,
        formula: Formula::parse(&cond.formula)?,
        desc: cond.desc.as_deref().map(Template::parse).transpose()?,
    })
}

fn solve_rule(spec: &Specification) -> Result<SolveRule> {
    if let Some(opt) = &spec.optimize {
        return Ok(SolveRule::Optimize {
            direction: match opt.direction {
                puzzleforge_schema::Direction::Minimize => Direction::Minimize,
                puzzleforge_schema::Direction::Maximize => Direction::Maximize,
            },
            objective: Formula::parse(&opt.formula)?,
        });
    }
    if let Some(post) = &spec.post_generation {
        return Ok(SolveRule::PostGeneration {
            vars: post
                .post_gen_vars
                .iter()
                .map(|(name, source)| Ok((name.clone(), Formula::parse(source)?)))
                .collect::<Result<_>>()?,
            conditions: post
                .post_gen_conditions
                .iter()
                .map(|(name, cond)| static_rule(name, cond))
                .collect::<Result<_>>()?,
            calc_solution: spec.calc_solution,
        });
    }
    Ok(if spec.calc_solution {
        SolveRule::Enumerate
    } else {
        SolveRule::Skip
    })
}

fn option_rule(t: &OptionTemplate) -> Result<OptionRule> {
    Ok(OptionRule {
        site: SamplingSite {
            sources: parse_all(&t.source)?,
            amount: t.amount.as_deref().map(parse_all).transpose()?,
            order: t.order_or_default(),
            duplicate: t.duplicate_or_default(),
            domain_cond: true,
            dim: 1,
            dim_cond: Vec::new(),
            custom: custom(&t.custom_cond)?,
        },
        cond: t.cond,
        opt_formula: Formula::parse(&t.opt_formula)?,
        opt_text: Template::parse(t.opt_text_or_default())?,
        range: t.domain.as_deref().map(Formula::parse).transpose()?,
    })
}

fn query_rule(name: &str, query: &Query) -> Result<QueryRule> {
    Ok(match query {
        Query::Open(q) => QueryRule::Open {
            name: name.to_string(),
            desc: Template::parse(&q.desc)?,
            ans_formula: Formula::parse(&q.ans_formula)?,
            ans_text: Formula::parse(&q.ans_text)?,
            ans_assertion: Formula::parse(&q.ans_assertion)?,
        },
        Query::Selection(q) => QueryRule::Selection {
            name: name.to_string(),
            desc: Template::parse(&q.desc)?,
            select_type: q.select_type,
            opt_num: q.opt_num,
            templates: q
                .options
                .templates()
                .iter()
                .map(option_rule)
                .collect::<Result<_>>()?,
            multiple: matches!(q.options, OptionSet::Multiple { .. }),
        },
    })
}

fn sym_type(spec: &Specification) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (_, def) in spec.defined_symbols() {
        for sort in def.sort.as_slice() {
            if !out.contains(sort) {
                out.push(sort.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzleforge_test::specs;

    fn program(text: &str) -> Program {
        Emitter::emit(&Specification::from_yaml_str(text).unwrap()).unwrap()
    }

    #[test]
    fn test_instruction_order_follows_document() {
        let p = program(specs::LAMPS);
        let kinds: Vec<&str> = p.instructions().iter().map(Instruction::kind).collect();
        assert_eq!(
            kinds,
            ["operator", "variable", "family", "static_condition", "solve", "query", "problem"]
        );
        assert_eq!(p.sym_type(), ["bool"]);
        assert!(!p.optimizes());
    }

    #[test]
    fn test_solve_rule_selection() {
        let p = program(specs::PAIRS);
        assert!(p.instructions().contains(&Instruction::Solve(SolveRule::Skip)));

        let p = program(specs::OPTIMIZE_UNIQUE);
        assert!(p.optimizes());
        assert!(p.instructions().iter().any(|i| matches!(
            i,
            Instruction::Solve(SolveRule::Optimize { direction: Direction::Maximize, .. })
        )));

        let p = program(specs::POST_GENERATION);
        let post = p.instructions().iter().find_map(|i| match i {
            Instruction::Solve(SolveRule::PostGeneration { vars, conditions, .. }) => {
                Some((vars.len(), conditions.len()))
            }
            _ => None,
        });
        assert_eq!(post, Some((1, 2)));
    }

    #[test]
    fn test_bool_variable_without_domain_is_a_coin() {
        let p = program(specs::FLAGS);
        let flag = p.instructions().iter().find_map(|i| match i {
            Instruction::Variable(v) if v.name == "flag" => Some(v.source.clone()),
            _ => None,
        });
        assert_eq!(flag, Some(VariableSource::Choice(None)));
    }

    #[test]
    fn test_option_templates_default_order() {
        let p = program(specs::MULTI_SELECTION);
        let q = p.queries().next().unwrap();
        match q {
            QueryRule::Selection { templates, multiple, opt_num, .. } => {
                assert!(*multiple);
                assert_eq!(*opt_num, 4);
                assert_eq!(templates.len(), 2);
                assert_eq!(templates[0].site.order, vec![false]);
                assert_eq!(templates[0].opt_text.source(), "light {_opt[0][0]} is on");
            }
            other => panic!("expected a selection query, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_document_is_rejected_before_emission() {
        let spec = Specification::from_yaml_str("variables: {}\ndesc: ''\n").unwrap();
        let mut broken = spec.clone();
        broken.max_solution = 0;
        assert!(matches!(
            Emitter::emit(&broken),
            Err(PuzzleError::Schema { .. })
        ));
        assert!(Emitter::emit(&spec).is_ok());
    }
}
