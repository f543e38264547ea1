//! Projection writers.
//!
//! A [`ProjectionWriter`] walks the compiled SELECT list for one tuple and
//! drives an [`OutputWriter`]. Every `start_*` call is matched by its
//! `end_*` call before the enclosing object or array ends, and every value
//! inside an object is preceded by its field name.

use super::{sort_tuples, CompiledPredicate, CompiledScalar, CompiledSortItem, ExpressionCompiler};
use crate::alias::{AliasId, TableAliasTree};
use crate::ast::{Expression, NestedShape, SelectItem};
use crate::context::ExecutionContext;
use braid_core::{Error, Result, Tuple, Value};
use std::rc::Rc;

/// Receives the shaped output of a query.
pub trait OutputWriter {
    /// Called once per result set, before its first row, with the top-level
    /// column names.
    fn start_result_set(&mut self, _columns: &[String]) -> Result<()> {
        Ok(())
    }

    fn end_result_set(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_object(&mut self) -> Result<()>;

    fn end_object(&mut self) -> Result<()>;

    fn start_array(&mut self) -> Result<()>;

    fn end_array(&mut self) -> Result<()>;

    fn write_field_name(&mut self, name: &str) -> Result<()>;

    fn write_value(&mut self, value: &Value) -> Result<()>;
}

#[derive(Clone, Debug)]
enum Projection {
    Field {
        name: String,
        named: bool,
        value: CompiledScalar,
    },
    Asterisk {
        aliases: Vec<AliasId>,
    },
    Nested {
        name: String,
        shape: NestedShape,
        source: Option<CompiledScalar>,
        filter: Option<CompiledPredicate>,
        order: Vec<CompiledSortItem>,
        children: Vec<Projection>,
    },
}

/// Compiled SELECT list.
#[derive(Clone, Debug)]
pub struct ProjectionWriter {
    items: Vec<Projection>,
    tree: Rc<TableAliasTree>,
}

impl ProjectionWriter {
    /// Top-level column names. `*` expands to the columns its aliases
    /// discovered so far, or `alias.*` before the first row. Discovery
    /// happens once per alias, so the list only changes on that first row.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        for item in &self.items {
            match item {
                Projection::Field { name, .. } | Projection::Nested { name, .. } => out.push(name.clone()),
                Projection::Asterisk { aliases } => {
                    for alias in aliases {
                        let node = self.tree.get(*alias);
                        match node.discovered_columns() {
                            Some(columns) => out.extend(columns.iter().cloned()),
                            None => out.push(format!("{}.*", node.name())),
                        }
                    }
                }
            }
        }
        out
    }

    /// Writes `tuple` as one object.
    pub fn write(&self, tuple: &Tuple, ctx: &mut ExecutionContext, writer: &mut dyn OutputWriter) -> Result<()> {
        writer.start_object()?;
        self.write_items(&self.items, tuple, ctx, writer)?;
        writer.end_object()
    }

    /// Evaluates the top-level values of `tuple`. Nested items become arrays.
    pub fn values(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(self.items.len());
        self.collect_values(&self.items, tuple, ctx, &mut out)?;
        Ok(out)
    }

    fn write_items(
        &self,
        items: &[Projection],
        tuple: &Tuple,
        ctx: &mut ExecutionContext,
        writer: &mut dyn OutputWriter,
    ) -> Result<()> {
        for item in items {
            match item {
                Projection::Field { name, value, .. } => {
                    writer.write_field_name(name)?;
                    writer.write_value(&value.evaluate(tuple, ctx)?)?;
                }
                Projection::Asterisk { aliases } => {
                    for (name, value) in self.asterisk_fields(aliases, tuple) {
                        writer.write_field_name(&name)?;
                        writer.write_value(&value)?;
                    }
                }
                Projection::Nested { name, .. } => {
                    writer.write_field_name(name)?;
                    self.write_nested(item, tuple, ctx, writer)?;
                }
            }
        }
        Ok(())
    }

    fn write_nested(
        &self,
        item: &Projection,
        tuple: &Tuple,
        ctx: &mut ExecutionContext,
        writer: &mut dyn OutputWriter,
    ) -> Result<()> {
        let Projection::Nested {
            shape,
            source,
            children,
            ..
        } = item
        else {
            return Ok(());
        };
        match (shape, source) {
            (NestedShape::Object, None) => {
                writer.start_object()?;
                self.write_items(children, tuple, ctx, writer)?;
                writer.end_object()
            }
            (NestedShape::Object, Some(_)) => match self.members(item, tuple, ctx)?.first() {
                Some(member) => {
                    writer.start_object()?;
                    self.write_items(children, member, ctx, writer)?;
                    writer.end_object()
                }
                None => writer.write_value(&Value::Null),
            },
            (NestedShape::Array, None) => {
                writer.start_array()?;
                for child in children {
                    match child {
                        Projection::Field { value, .. } => writer.write_value(&value.evaluate(tuple, ctx)?)?,
                        Projection::Asterisk { aliases } => {
                            for (_, value) in self.asterisk_fields(aliases, tuple) {
                                writer.write_value(&value)?;
                            }
                        }
                        Projection::Nested { .. } => self.write_nested(child, tuple, ctx, writer)?,
                    }
                }
                writer.end_array()
            }
            (NestedShape::Array, Some(_)) => {
                writer.start_array()?;
                for member in self.members(item, tuple, ctx)? {
                    match single_value(children) {
                        Some(value) => writer.write_value(&value.evaluate(&member, ctx)?)?,
                        None => {
                            writer.start_object()?;
                            self.write_items(children, &member, ctx, writer)?;
                            writer.end_object()?;
                        }
                    }
                }
                writer.end_array()
            }
        }
    }

    /// Rows a nested item iterates, each merged over `tuple`, filtered and
    /// sorted.
    fn members(&self, item: &Projection, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<Vec<Tuple>> {
        let Projection::Nested {
            source: Some(source),
            filter,
            order,
            ..
        } = item
        else {
            return Ok(vec![tuple.clone()]);
        };
        let members = match source.evaluate(tuple, ctx)? {
            Value::Null => return Ok(Vec::new()),
            Value::Tuples(members) => members,
            other => {
                return Err(Error::type_mismatch(
                    source.text(),
                    format!("nested items iterate an alias, got {}", other),
                ))
            }
        };
        let mut out = Vec::with_capacity(members.len());
        for member in members.iter() {
            let merged = tuple.merge(member);
            let keep = match filter {
                Some(filter) => filter.test(&merged, ctx)?,
                None => true,
            };
            if keep {
                out.push(merged);
            }
        }
        if order.is_empty() {
            Ok(out)
        } else {
            sort_tuples(order, out, ctx)
        }
    }

    fn asterisk_fields(&self, aliases: &[AliasId], tuple: &Tuple) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for alias in aliases {
            match tuple.row(*alias) {
                Some(row) => out.extend(row.columns().iter().cloned().zip(row.values().iter().cloned())),
                None => {
                    if let Some(columns) = self.tree.get(*alias).discovered_columns() {
                        out.extend(columns.iter().map(|c| (c.clone(), Value::Null)));
                    }
                }
            }
        }
        out
    }

    fn collect_values(
        &self,
        items: &[Projection],
        tuple: &Tuple,
        ctx: &mut ExecutionContext,
        out: &mut Vec<Value>,
    ) -> Result<()> {
        for item in items {
            match item {
                Projection::Field { value, .. } => out.push(value.evaluate(tuple, ctx)?),
                Projection::Asterisk { aliases } => {
                    out.extend(self.asterisk_fields(aliases, tuple).into_iter().map(|(_, v)| v))
                }
                Projection::Nested { .. } => out.push(self.nested_value(item, tuple, ctx)?),
            }
        }
        Ok(())
    }

    fn nested_value(&self, item: &Projection, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<Value> {
        let Projection::Nested {
            shape,
            source,
            children,
            ..
        } = item
        else {
            return Ok(Value::Null);
        };
        let members = self.members(item, tuple, ctx)?;
        match (shape, source) {
            (NestedShape::Object, Some(_)) if members.is_empty() => Ok(Value::Null),
            (NestedShape::Object, _) | (NestedShape::Array, None) => {
                let mut values = Vec::new();
                if let Some(member) = members.first() {
                    self.collect_values(children, member, ctx, &mut values)?;
                }
                Ok(Value::Array(values))
            }
            (NestedShape::Array, Some(_)) => {
                let mut elements = Vec::with_capacity(members.len());
                for member in &members {
                    match single_value(children) {
                        Some(value) => elements.push(value.evaluate(member, ctx)?),
                        None => {
                            let mut values = Vec::new();
                            self.collect_values(children, member, ctx, &mut values)?;
                            elements.push(Value::Array(values));
                        }
                    }
                }
                Ok(Value::Array(elements))
            }
        }
    }
}

/// The scalar of a child list that is a single unnamed expression.
fn single_value(children: &[Projection]) -> Option<&CompiledScalar> {
    match children {
        [Projection::Field {
            named: false,
            value,
            ..
        }] => Some(value),
        _ => None,
    }
}

fn field_name(expression: &Expression) -> String {
    match expression.unwrap_nested() {
        Expression::Reference(r) => r.name.last().unwrap_or_default().to_string(),
        Expression::FunctionCall { name, .. } => name.clone(),
        Expression::Variable(name) => name.trim_start_matches('@').to_string(),
        other => other.to_string(),
    }
}

impl<'a> ExpressionCompiler<'a> {
    /// Compiles a SELECT list in the current scope.
    pub fn compile_projection(&mut self, items: &[SelectItem]) -> Result<ProjectionWriter> {
        let items = self.compile_projection_items(items)?;
        Ok(ProjectionWriter {
            items,
            tree: self.resolver.tree().clone(),
        })
    }

    fn compile_projection_items(&mut self, items: &[SelectItem]) -> Result<Vec<Projection>> {
        items.iter().map(|item| self.compile_projection_item(item)).collect()
    }

    fn compile_projection_item(&mut self, item: &SelectItem) -> Result<Projection> {
        match item {
            SelectItem::Expression { expression, alias } => Ok(Projection::Field {
                name: alias.clone().unwrap_or_else(|| field_name(expression)),
                named: alias.is_some(),
                value: self.compile(expression)?,
            }),
            SelectItem::Asterisk { alias } => {
                let tree = self.resolver.tree().clone();
                let aliases = match alias {
                    Some(name) => {
                        let resolved = self.resolver.resolve_name(self.scope, &[name.clone()]);
                        match resolved.alias {
                            Some(id) if resolved.column.is_none() => vec![id],
                            _ => return Err(Error::unknown_alias(name.as_str())),
                        }
                    }
                    None => {
                        let mut ids: Vec<AliasId> = tree
                            .subtree(self.scope)
                            .into_iter()
                            .filter(|id| *id != TableAliasTree::ROOT)
                            .collect();
                        ids.sort_unstable();
                        ids
                    }
                };
                Ok(Projection::Asterisk { aliases })
            }
            SelectItem::Nested {
                shape,
                alias,
                from,
                items,
                where_clause,
                order_by,
            } => {
                let source = from.as_ref().map(|f| self.compile(f)).transpose()?;
                let child_scope = match from {
                    Some(f) => self
                        .resolver
                        .lambda_target(self.scope, f, &self.bindings)
                        .ok_or_else(|| Error::unknown_alias(f.to_string()))?,
                    None => self.scope,
                };
                let saved = std::mem::replace(&mut self.scope, child_scope);
                let compiled = (|| -> Result<_> {
                    let children = self.compile_projection_items(items)?;
                    let filter = where_clause.as_ref().map(|w| self.compile_predicate(w)).transpose()?;
                    let order = self.compile_sort_items(order_by)?;
                    Ok((children, filter, order))
                })();
                self.scope = saved;
                let (children, filter, order) = compiled?;
                let name = alias.clone().unwrap_or_else(|| match shape {
                    NestedShape::Object => "object".to_string(),
                    NestedShape::Array => "array".to_string(),
                });
                Ok(Projection::Nested {
                    name,
                    shape: *shape,
                    source,
                    filter,
                    order,
                    children,
                })
            }
        }
    }
}
