//! Engine facade: catalogs, functions and configuration in one place.

use super::{CompiledQuery, OperatorBuilder};
use crate::alias::TableAliasTree;
use crate::ast::{Expression, Select, Statement};
use crate::catalog::{Catalog, CatalogRegistry};
use crate::compiler::{ExpressionCompiler, FunctionRegistry, OutputWriter};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::resolver::QualifiedNameResolver;
use braid_core::{Result, Tuple, Value};
use std::rc::Rc;
use tracing::debug;

/// Entry point for compiling and running queries.
///
/// # Example
///
/// ```ignore
/// let mut engine = Engine::new(EngineConfig::default().with_default_catalog("mem"));
/// engine.register_catalog("mem", Rc::new(catalog));
/// let query = engine.compile(&select)?;
/// let rows = query.run(&mut ctx, &mut writer)?;
/// ```
pub struct Engine {
    catalogs: CatalogRegistry,
    functions: FunctionRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut catalogs = CatalogRegistry::new();
        catalogs.set_default(config.default_catalog.as_deref());
        Self {
            catalogs,
            functions: FunctionRegistry::with_builtins(),
            config,
        }
    }

    /// Registers a catalog and the scalar functions it exposes, which become
    /// callable as `alias.function(...)`.
    pub fn register_catalog(&mut self, alias: &str, catalog: Rc<dyn Catalog>) {
        for function in catalog.functions() {
            self.functions.register(Some(alias), function);
        }
        self.catalogs.register(alias, catalog);
    }

    pub fn catalogs(&self) -> &CatalogRegistry {
        &self.catalogs
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compile(&self, select: &Select) -> Result<CompiledQuery> {
        OperatorBuilder::new(&self.catalogs, &self.functions, &self.config).build(select)
    }

    /// Compiles and runs one query.
    pub fn execute(&self, select: &Select, ctx: &mut ExecutionContext, writer: &mut dyn OutputWriter) -> Result<u64> {
        self.compile(select)?.run(ctx, writer)
    }

    /// Runs statements in order. Statement state is reset before each one;
    /// variables set along the way stay visible to later statements.
    ///
    /// Returns the rows written per SELECT. Stops at the first error.
    pub fn execute_batch(
        &self,
        statements: &[Statement],
        ctx: &mut ExecutionContext,
        writer: &mut dyn OutputWriter,
    ) -> Result<Vec<u64>> {
        let mut counts = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            ctx.begin_statement();
            match statement {
                Statement::Select(select) => counts.push(self.execute(select, ctx, writer)?),
                Statement::SetVariable { name, value } => {
                    let value = self.evaluate(value, ctx)?;
                    debug!(statement = index, variable = %name, "variable set");
                    ctx.set_variable(name, value);
                }
            }
        }
        Ok(counts)
    }

    /// Evaluates an expression that reads no table source.
    pub fn evaluate(&self, expr: &Expression, ctx: &mut ExecutionContext) -> Result<Value> {
        let tree = Rc::new(TableAliasTree::builder().build());
        let resolver = QualifiedNameResolver::new(tree);
        let scalar = ExpressionCompiler::new(&resolver, &self.functions).compile(expr)?;
        scalar.evaluate(&Tuple::new(1), ctx)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Session;

    struct Discard;

    impl OutputWriter for Discard {
        fn start_object(&mut self) -> Result<()> {
            Ok(())
        }
        fn end_object(&mut self) -> Result<()> {
            Ok(())
        }
        fn start_array(&mut self) -> Result<()> {
            Ok(())
        }
        fn end_array(&mut self) -> Result<()> {
            Ok(())
        }
        fn write_field_name(&mut self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn write_value(&mut self, _value: &Value) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_evaluate_constant() {
        let engine = Engine::default();
        let mut ctx = ExecutionContext::new(Rc::new(Session::new()));
        let value = engine
            .evaluate(&Expression::add(Expression::lit(2i32), Expression::lit(3i32)), &mut ctx)
            .unwrap();
        assert_eq!(value, Value::Int32(5));
    }

    #[test]
    fn test_batch_keeps_variables() {
        let engine = Engine::default();
        let mut ctx = ExecutionContext::new(Rc::new(Session::new()));
        let statements = vec![
            Statement::SetVariable {
                name: "@x".into(),
                value: Expression::lit(7i32),
            },
            Statement::SetVariable {
                name: "@y".into(),
                value: Expression::add(Expression::var("@x"), Expression::lit(1i32)),
            },
        ];
        let counts = engine.execute_batch(&statements, &mut ctx, &mut Discard).unwrap();
        assert!(counts.is_empty());
        assert_eq!(ctx.variable("y"), Some(&Value::Int32(8)));
    }
}
