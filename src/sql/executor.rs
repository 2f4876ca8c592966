//! Query executor - runs statements against the database core
//!
//! SELECT flows scan -> join -> filter -> group/aggregate -> sort ->
//! project -> distinct -> offset/limit. Joined rows carry qualified
//! column keys (`alias.col`); the evaluator resolves bare names through
//! the qualifier. Mutations journal undo operations and roll back on any
//! error, so a statement is all-or-nothing; successful mutations flush
//! before returning.
//!
//! When a WHERE conjunct tests an indexed column of a single-table FROM
//! (equality, IN over literals, BETWEEN, or a range comparison), the scan
//! is seeded from the index instead of the full table; the complete
//! predicate is still evaluated per candidate row.

use super::ast::*;
use super::evaluator::ExprEvaluator;
use crate::database::{GritDB, UndoLog};
use crate::error::{DbError, Result};
use crate::types::{RowId, SqlRow, TableSchema, Value};
use std::collections::HashMap;

/// Result of one statement
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Output column names, in projection order
    pub columns: Vec<String>,
    /// Result rows, each aligned with `columns`
    pub rows: Vec<Vec<Value>>,
    /// Rows touched by a mutation
    pub affected: usize,
    /// Human-readable outcome
    pub status: String,
}

impl QueryResult {
    fn rows_result(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let status = format!("{} row(s)", rows.len());
        Self {
            columns,
            rows,
            affected: 0,
            status,
        }
    }

    fn mutation(affected: usize, status: String) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected,
            status,
        }
    }

    fn definition(status: String) -> Self {
        Self::mutation(0, status)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as column-name -> value maps
    pub fn rows_as_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Candidate index access path extracted from a WHERE conjunct
#[derive(Debug, Clone)]
enum IndexableCondition {
    /// col = value
    Point { column: String, value: Value },
    /// col IN (v1, v2, ...)
    Points { column: String, values: Vec<Value> },
    /// low <= col <= high (BETWEEN)
    Range {
        column: String,
        low: Value,
        high: Value,
    },
    /// col < / <= / > / >= value
    OpenRange {
        column: String,
        value: Value,
        op: BinaryOperator,
    },
}

pub struct QueryExecutor<'a> {
    db: &'a mut GritDB,
    evaluator: ExprEvaluator,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(db: &'a mut GritDB) -> Self {
        Self {
            db,
            evaluator: ExprEvaluator::new(),
        }
    }

    pub fn execute(&mut self, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::Select(s) => self.execute_select(&s),
            Statement::Insert(i) => self.execute_insert(&i),
            Statement::Update(u) => self.execute_update(&u),
            Statement::Delete(d) => self.execute_delete(&d),
            Statement::CreateTable(c) => self.execute_create_table(c),
            Statement::CreateIndex(c) => self.execute_create_index(&c),
            Statement::DropTable(d) => self.execute_drop_table(&d),
            Statement::DropIndex(d) => self.execute_drop_index(&d),
            Statement::ShowTables => self.execute_show_tables(),
            Statement::DescribeTable(t) => self.execute_describe(&t),
            Statement::Truncate(t) => self.execute_truncate(&t),
        }
    }

    // =======================================================================
    // SELECT
    // =======================================================================

    fn execute_select(&mut self, stmt: &SelectStmt) -> Result<QueryResult> {
        // FROM (+ JOINs), with index-assisted scan for single tables
        let (mut rows, base_columns) = self.build_from(&stmt.from, stmt.where_clause.as_ref())?;

        // WHERE keeps only rows whose predicate is true
        if let Some(pred) = &stmt.where_clause {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if self.evaluator.eval_predicate(pred, &row.1)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        // HAVING without GROUP BY still aggregates over a single group
        let grouped = stmt.group_by.is_some()
            || stmt.having.is_some()
            || stmt.columns.iter().any(|c| match c {
                SelectColumn::Expr(e, _) => e.contains_aggregate(),
                SelectColumn::Star => false,
            });

        let (columns, mut result_rows) = if grouped {
            self.select_grouped(stmt, &rows)?
        } else {
            self.select_plain(stmt, rows, &base_columns)?
        };

        if stmt.distinct {
            result_rows = dedup_rows(result_rows);
        }

        // OFFSET then LIMIT, after ordering
        if let Some(offset) = stmt.offset {
            result_rows = result_rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = stmt.limit {
            result_rows.truncate(limit);
        }

        Ok(QueryResult::rows_result(columns, result_rows))
    }

    /// Non-aggregated SELECT: sort the row stream, then project
    fn select_plain(
        &self,
        stmt: &SelectStmt,
        mut rows: Vec<(RowId, SqlRow)>,
        base_columns: &[(String, String)],
    ) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        if let Some(order_by) = &stmt.order_by {
            rows = self.sort_rows(rows, order_by)?;
        }

        let mut columns = Vec::new();
        for col in &stmt.columns {
            match col {
                SelectColumn::Star => {
                    columns.extend(base_columns.iter().map(|(display, _)| display.clone()));
                }
                SelectColumn::Expr(expr, alias) => {
                    columns.push(alias.clone().unwrap_or_else(|| expr.to_string()));
                }
            }
        }

        let mut projected = Vec::with_capacity(rows.len());
        for (_, row) in &rows {
            let mut out = Vec::with_capacity(columns.len());
            for col in &stmt.columns {
                match col {
                    SelectColumn::Star => {
                        for (_, key) in base_columns {
                            out.push(row.get(key).cloned().unwrap_or(Value::Null));
                        }
                    }
                    SelectColumn::Expr(expr, _) => {
                        out.push(self.evaluator.eval(expr, row)?);
                    }
                }
            }
            projected.push(out);
        }

        Ok((columns, projected))
    }

    /// GROUP BY / aggregate SELECT: partition, aggregate, HAVING, sort
    fn select_grouped(
        &self,
        stmt: &SelectStmt,
        rows: &[(RowId, SqlRow)],
    ) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let group_cols: &[String] = stmt.group_by.as_deref().unwrap_or(&[]);

        // Partition preserving first-appearance order
        let mut groups: Vec<Vec<&SqlRow>> = Vec::new();
        if group_cols.is_empty() {
            // All rows form one group, even when the input is empty
            groups.push(rows.iter().map(|(_, r)| r).collect());
        } else {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (_, row) in rows {
                let mut key = String::new();
                for col in group_cols {
                    let value = self.evaluator.eval(&Expr::Column(col.clone()), row)?;
                    key.push_str(&format!("{:?}|", value));
                }
                match seen.get(&key) {
                    Some(&idx) => groups[idx].push(row),
                    None => {
                        seen.insert(key, groups.len());
                        groups.push(vec![row]);
                    }
                }
            }
        }

        // Output column names; projected expressions may only reference
        // group keys and aggregate results
        let mut columns = Vec::new();
        for col in &stmt.columns {
            match col {
                SelectColumn::Star => {
                    return Err(DbError::Schema(
                        "SELECT * is not allowed with GROUP BY or aggregates".to_string(),
                    ));
                }
                SelectColumn::Expr(expr, alias) => {
                    validate_group_expr(expr, group_cols)?;
                    columns.push(alias.clone().unwrap_or_else(|| expr.to_string()));
                }
            }
        }

        if let Some(having) = &stmt.having {
            validate_group_expr(having, group_cols)?;
        }

        let empty_row = SqlRow::new();
        let mut result_rows = Vec::new();

        for group in &groups {
            // HAVING is evaluated against the group before projection
            if let Some(having) = &stmt.having {
                let folded = self.fold_aggregates(having, group)?;
                let row = group.first().copied().unwrap_or(&empty_row);
                if !self.evaluator.eval_predicate(&folded, row)? {
                    continue;
                }
            }

            let mut out = Vec::with_capacity(columns.len());
            for col in &stmt.columns {
                let SelectColumn::Expr(expr, _) = col else {
                    unreachable!("star rejected above");
                };
                let folded = self.fold_aggregates(expr, group)?;
                let row = group.first().copied().unwrap_or(&empty_row);
                out.push(self.evaluator.eval(&folded, row)?);
            }
            result_rows.push(out);
        }

        // ORDER BY over the projected columns
        if let Some(order_by) = &stmt.order_by {
            let named: Vec<SqlRow> = result_rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect::<SqlRow>()
                })
                .collect();

            let mut keyed: Vec<(Vec<Value>, Vec<Value>)> = Vec::with_capacity(result_rows.len());
            for (row, named_row) in result_rows.into_iter().zip(&named) {
                let mut keys = Vec::with_capacity(order_by.len());
                for item in order_by {
                    keys.push(self.evaluator.eval(&item.expr, named_row)?);
                }
                keyed.push((keys, row));
            }
            keyed.sort_by(|a, b| compare_sort_keys(&a.0, &b.0, order_by));
            result_rows = keyed.into_iter().map(|(_, row)| row).collect();
        }

        Ok((columns, result_rows))
    }

    /// Replace aggregate calls with their computed literals so the folded
    /// expression can be evaluated like any other
    fn fold_aggregates(&self, expr: &Expr, group: &[&SqlRow]) -> Result<Expr> {
        if expr.is_aggregate() {
            return Ok(Expr::Literal(self.compute_aggregate(expr, group)?));
        }

        let folded = match expr {
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(self.fold_aggregates(left, group)?),
                op: *op,
                right: Box::new(self.fold_aggregates(right, group)?),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op: *op,
                expr: Box::new(self.fold_aggregates(expr, group)?),
            },
            // Scalar function wrapping an aggregate, e.g. ABS(SUM(x));
            // the aggregate-call case itself returned above
            Expr::FunctionCall {
                name,
                args,
                distinct,
            } => Expr::FunctionCall {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| self.fold_aggregates(a, group))
                    .collect::<Result<_>>()?,
                distinct: *distinct,
            },
            Expr::In {
                expr,
                list,
                negated,
            } => Expr::In {
                expr: Box::new(self.fold_aggregates(expr, group)?),
                list: list
                    .iter()
                    .map(|e| self.fold_aggregates(e, group))
                    .collect::<Result<_>>()?,
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: Box::new(self.fold_aggregates(expr, group)?),
                low: Box::new(self.fold_aggregates(low, group)?),
                high: Box::new(self.fold_aggregates(high, group)?),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(self.fold_aggregates(expr, group)?),
                pattern: Box::new(self.fold_aggregates(pattern, group)?),
                negated: *negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(self.fold_aggregates(expr, group)?),
                negated: *negated,
            },
            other => other.clone(),
        };
        Ok(folded)
    }

    /// Evaluate one aggregate call over a group of rows
    fn compute_aggregate(&self, expr: &Expr, group: &[&SqlRow]) -> Result<Value> {
        let Expr::FunctionCall {
            name,
            args,
            distinct,
        } = expr
        else {
            return Err(DbError::Type("Expected an aggregate call".to_string()));
        };
        let func = name.to_uppercase();

        // COUNT(*) counts rows, including nulls
        if func == "COUNT" && (args.is_empty() || matches!(args[0], Expr::Wildcard)) {
            if *distinct {
                return Err(DbError::Type(
                    "COUNT(DISTINCT *) is not supported".to_string(),
                ));
            }
            return Ok(Value::Integer(group.len() as i64));
        }

        if args.len() != 1 {
            return Err(DbError::Type(format!(
                "{} takes exactly one argument",
                func
            )));
        }

        // Collect non-null argument values across the group
        let mut values = Vec::with_capacity(group.len());
        for row in group {
            let v = self.evaluator.eval(&args[0], row)?;
            if !v.is_null() {
                values.push(v);
            }
        }

        if *distinct {
            let mut seen = std::collections::HashSet::new();
            values.retain(|v| seen.insert(format!("{:?}", v)));
        }

        match func.as_str() {
            "COUNT" => Ok(Value::Integer(values.len() as i64)),

            "SUM" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                // Integer sum stays integer; any float promotes the total
                let mut int_sum: i64 = 0;
                let mut float_sum: f64 = 0.0;
                let mut is_float = false;
                for v in &values {
                    match v {
                        Value::Integer(i) => {
                            int_sum = int_sum.wrapping_add(*i);
                            float_sum += *i as f64;
                        }
                        Value::Float(f) => {
                            is_float = true;
                            float_sum += f;
                        }
                        other => {
                            return Err(DbError::Type(format!(
                                "SUM requires numeric values, got {}",
                                other.kind_name()
                            )));
                        }
                    }
                }
                if is_float {
                    Ok(Value::Float(float_sum))
                } else {
                    Ok(Value::Integer(int_sum))
                }
            }

            "AVG" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let mut sum = 0.0;
                for v in &values {
                    match v {
                        Value::Integer(i) => sum += *i as f64,
                        Value::Float(f) => sum += f,
                        other => {
                            return Err(DbError::Type(format!(
                                "AVG requires numeric values, got {}",
                                other.kind_name()
                            )));
                        }
                    }
                }
                Ok(Value::Float(sum / values.len() as f64))
            }

            "MIN" | "MAX" => {
                let mut extremum: Option<Value> = None;
                for v in values {
                    extremum = Some(match extremum {
                        None => v,
                        Some(current) => {
                            let take_new = match v.compare(&current)? {
                                Some(std::cmp::Ordering::Less) => func == "MIN",
                                Some(std::cmp::Ordering::Greater) => func == "MAX",
                                _ => false,
                            };
                            if take_new {
                                v
                            } else {
                                current
                            }
                        }
                    });
                }
                Ok(extremum.unwrap_or(Value::Null))
            }

            _ => Err(DbError::Schema(format!("Unknown function '{}'", name))),
        }
    }

    /// Stable sort of a raw row stream by ORDER BY keys
    fn sort_rows(
        &self,
        rows: Vec<(RowId, SqlRow)>,
        order_by: &[OrderByExpr],
    ) -> Result<Vec<(RowId, SqlRow)>> {
        let mut keyed: Vec<(Vec<Value>, (RowId, SqlRow))> = Vec::with_capacity(rows.len());
        for row in rows {
            let mut keys = Vec::with_capacity(order_by.len());
            for item in order_by {
                keys.push(self.evaluator.eval(&item.expr, &row.1)?);
            }
            keyed.push((keys, row));
        }

        keyed.sort_by(|a, b| compare_sort_keys(&a.0, &b.0, order_by));
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    // =======================================================================
    // FROM / JOIN
    // =======================================================================

    /// Build the row stream for a FROM clause. Returns the rows plus the
    /// base projection for `*`: (display name, row key) pairs.
    fn build_from(
        &self,
        from: &TableRef,
        where_clause: Option<&Expr>,
    ) -> Result<(Vec<(RowId, SqlRow)>, Vec<(String, String)>)> {
        match from {
            TableRef::Table { name, alias } => {
                let schema = self.db.schema(name)?;
                let display_alias = alias.clone().unwrap_or_else(|| schema.name.clone());
                let rows = self.scan_table(name, &display_alias, where_clause)?;
                // Bare display names until a join qualifies them
                let base_columns = base_columns_for(schema, &display_alias, false);
                Ok((rows, base_columns))
            }
            TableRef::Join {
                left,
                right,
                join_type,
                on_condition,
            } => {
                // Left side may itself be a join chain; index selection is
                // not attempted under joins.
                let (left_rows, mut base_columns) = self.build_from(left, None)?;

                let TableRef::Table { name, alias } = right.as_ref() else {
                    return Err(DbError::Schema(
                        "Nested join on the right side is not supported".to_string(),
                    ));
                };
                let right_schema = self.db.schema(name)?;
                let right_alias = alias.clone().unwrap_or_else(|| right_schema.name.clone());
                let right_rows = self.scan_table(name, &right_alias, None)?;
                base_columns.extend(base_columns_for(right_schema, &right_alias, true));

                // Qualify display names on the left too once a join is present
                for (display, key) in base_columns.iter_mut() {
                    if !display.contains('.') {
                        *display = key.clone();
                    }
                }

                let right_null_row: SqlRow = right_schema
                    .columns
                    .iter()
                    .map(|c| (format!("{}.{}", right_alias, c.name), Value::Null))
                    .collect();

                let mut joined = Vec::new();
                for (left_id, left_row) in &left_rows {
                    let mut matched = false;
                    for (_, right_row) in &right_rows {
                        let mut combined = left_row.clone();
                        combined.extend(right_row.iter().map(|(k, v)| (k.clone(), v.clone())));

                        if self.evaluator.eval_predicate(on_condition, &combined)? {
                            matched = true;
                            joined.push((*left_id, combined));
                        }
                    }

                    if !matched && *join_type == JoinType::Left {
                        let mut combined = left_row.clone();
                        combined
                            .extend(right_null_row.iter().map(|(k, v)| (k.clone(), v.clone())));
                        joined.push((*left_id, combined));
                    }
                }

                Ok((joined, base_columns))
            }
        }
    }

    /// Scan one table into qualified rows, seeding from an index when a
    /// WHERE conjunct allows it
    fn scan_table(
        &self,
        table: &str,
        alias: &str,
        where_clause: Option<&Expr>,
    ) -> Result<Vec<(RowId, SqlRow)>> {
        let schema = self.db.schema(table)?;
        let store = self.db.store(table)?;

        let candidates = where_clause
            .and_then(|pred| self.index_candidates(table, alias, pred));

        let make_row = |row: &crate::types::Row| -> SqlRow {
            schema
                .columns
                .iter()
                .zip(row.iter())
                .map(|(col, value)| (format!("{}.{}", alias, col.name), value.clone()))
                .collect()
        };

        let rows = match candidates {
            Some(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                ids.into_iter()
                    .filter_map(|id| store.get(id).map(|row| (id, make_row(row))))
                    .collect()
            }
            None => store.scan().map(|(id, row)| (id, make_row(row))).collect(),
        };

        Ok(rows)
    }

    /// Find the first WHERE conjunct an index can answer
    fn index_candidates(&self, table: &str, alias: &str, pred: &Expr) -> Option<Vec<RowId>> {
        let mut conjuncts = Vec::new();
        collect_conjuncts(pred, &mut conjuncts);

        for conjunct in conjuncts {
            let Some(cond) = extract_indexable(conjunct, alias) else {
                continue;
            };
            let column = match &cond {
                IndexableCondition::Point { column, .. }
                | IndexableCondition::Points { column, .. }
                | IndexableCondition::Range { column, .. }
                | IndexableCondition::OpenRange { column, .. } => column.clone(),
            };
            let Some(tree) = self.db.find_index(table, &column) else {
                continue;
            };

            let ids = match cond {
                IndexableCondition::Point { value, .. } => tree.search(&value),
                IndexableCondition::Points { values, .. } => {
                    let mut ids = Vec::new();
                    for v in values {
                        ids.extend(tree.search(&v));
                    }
                    ids
                }
                IndexableCondition::Range { low, high, .. } => {
                    tree.range_scan(Some(&low), Some(&high), true, true)
                }
                IndexableCondition::OpenRange { value, op, .. } => match op {
                    BinaryOperator::Lt => tree.range_scan(None, Some(&value), true, false),
                    BinaryOperator::Le => tree.range_scan(None, Some(&value), true, true),
                    BinaryOperator::Gt => tree.range_scan(Some(&value), None, false, true),
                    BinaryOperator::Ge => tree.range_scan(Some(&value), None, true, true),
                    _ => continue,
                },
            };
            return Some(ids);
        }

        None
    }

    // =======================================================================
    // Mutations
    // =======================================================================

    /// Run a journaled mutation: flush on success, roll back on any error
    /// (including a failed flush)
    fn run_mutation<F>(&mut self, f: F) -> Result<QueryResult>
    where
        F: FnOnce(&mut GritDB, &mut UndoLog) -> Result<QueryResult>,
    {
        let mut log = UndoLog::new();
        match f(self.db, &mut log) {
            Ok(result) => match self.db.flush() {
                Ok(()) => Ok(result),
                Err(e) => {
                    self.db.rollback(log);
                    Err(e)
                }
            },
            Err(e) => {
                self.db.rollback(log);
                Err(e)
            }
        }
    }

    fn execute_insert(&mut self, stmt: &InsertStmt) -> Result<QueryResult> {
        let schema = self.db.schema(&stmt.table)?.clone();

        let column_names: Vec<String> = match &stmt.columns {
            Some(cols) => {
                for col in cols {
                    if schema.get_column(col).is_none() {
                        return Err(DbError::Schema(format!(
                            "Unknown column '{}' in table '{}'",
                            col, schema.name
                        )));
                    }
                }
                cols.clone()
            }
            None => schema.column_names(),
        };

        let evaluator = ExprEvaluator::new();
        let empty = SqlRow::new();
        let stmt_values = stmt.values.clone();

        self.run_mutation(move |db, log| {
            let mut inserted = 0;
            for value_row in &stmt_values {
                if value_row.len() != column_names.len() {
                    return Err(DbError::Schema(format!(
                        "Column count mismatch: expected {}, got {}",
                        column_names.len(),
                        value_row.len()
                    )));
                }

                let mut provided: HashMap<String, Value> = HashMap::new();
                for (name, expr) in column_names.iter().zip(value_row) {
                    let value = evaluator.eval(expr, &empty)?;
                    if provided.insert(name.to_lowercase(), value).is_some() {
                        return Err(DbError::Schema(format!(
                            "Column '{}' specified more than once",
                            name
                        )));
                    }
                }

                let row = schema.finalize_row(provided)?;
                db.insert_row(&schema.name, row, log)?;
                inserted += 1;
            }

            Ok(QueryResult::mutation(
                inserted,
                format!("Inserted {} row(s)", inserted),
            ))
        })
    }

    fn execute_update(&mut self, stmt: &UpdateStmt) -> Result<QueryResult> {
        let schema = self.db.schema(&stmt.table)?.clone();

        // Resolve assignment targets up front
        let mut targets = Vec::with_capacity(stmt.assignments.len());
        for (col, expr) in &stmt.assignments {
            let position = schema.get_column_position(col).ok_or_else(|| {
                DbError::Schema(format!(
                    "Unknown column '{}' in table '{}'",
                    col, schema.name
                ))
            })?;
            targets.push((position, expr.clone()));
        }

        // Materialize matching rows before mutating
        let matches = self.matching_rows(&schema, stmt.where_clause.as_ref())?;

        let evaluator = ExprEvaluator::new();
        self.run_mutation(move |db, log| {
            let mut updated = 0;
            for (row_id, sql_row, old_row) in &matches {
                let mut new_row = old_row.clone();
                for (position, expr) in &targets {
                    let col = &schema.columns[*position];
                    let value = evaluator.eval(expr, sql_row)?;
                    if value.is_null() && col.not_null {
                        return Err(DbError::Constraint(format!(
                            "Column '{}' cannot be NULL",
                            col.name
                        )));
                    }
                    new_row[*position] = col.col_type.coerce(value)?;
                }

                db.update_row(&schema.name, *row_id, new_row, log)?;
                updated += 1;
            }

            Ok(QueryResult::mutation(
                updated,
                format!("Updated {} row(s)", updated),
            ))
        })
    }

    fn execute_delete(&mut self, stmt: &DeleteStmt) -> Result<QueryResult> {
        let schema = self.db.schema(&stmt.table)?.clone();
        let matches = self.matching_rows(&schema, stmt.where_clause.as_ref())?;

        self.run_mutation(move |db, log| {
            let mut deleted = 0;
            for (row_id, _, _) in &matches {
                db.delete_row(&schema.name, *row_id, log)?;
                deleted += 1;
            }

            Ok(QueryResult::mutation(
                deleted,
                format!("Deleted {} row(s)", deleted),
            ))
        })
    }

    /// Rows of a table matching an optional predicate, with both the named
    /// view (for expression evaluation) and the raw row image
    #[allow(clippy::type_complexity)]
    fn matching_rows(
        &self,
        schema: &TableSchema,
        predicate: Option<&Expr>,
    ) -> Result<Vec<(RowId, SqlRow, crate::types::Row)>> {
        let store = self.db.store(&schema.name)?;
        let mut out = Vec::new();

        for (row_id, row) in store.scan() {
            let sql_row: SqlRow = schema
                .columns
                .iter()
                .zip(row.iter())
                .map(|(col, value)| (col.name.clone(), value.clone()))
                .collect();

            let keep = match predicate {
                Some(pred) => self.evaluator.eval_predicate(pred, &sql_row)?,
                None => true,
            };
            if keep {
                out.push((row_id, sql_row, row.clone()));
            }
        }

        Ok(out)
    }

    // =======================================================================
    // DDL
    // =======================================================================

    fn execute_create_table(&mut self, stmt: CreateTableStmt) -> Result<QueryResult> {
        let mut columns = stmt.columns;

        // DEFAULT literals must fit the declared type
        for col in &mut columns {
            if let Some(default) = col.default.take() {
                let coerced = col.col_type.coerce(default).map_err(|e| {
                    DbError::Schema(format!(
                        "Invalid DEFAULT for column '{}': {}",
                        col.name, e
                    ))
                })?;
                col.default = Some(coerced);
            }
        }

        let schema = TableSchema::new(stmt.table.clone(), columns)?;
        self.db.create_table(schema)?;
        self.db.flush()?;

        Ok(QueryResult::definition(format!(
            "Table '{}' created",
            stmt.table
        )))
    }

    fn execute_drop_table(&mut self, stmt: &DropTableStmt) -> Result<QueryResult> {
        self.db.drop_table(&stmt.table)?;
        self.db.flush()?;
        Ok(QueryResult::definition(format!(
            "Table '{}' dropped",
            stmt.table
        )))
    }

    fn execute_create_index(&mut self, stmt: &CreateIndexStmt) -> Result<QueryResult> {
        self.db.create_index(crate::types::IndexDef::new(
            stmt.index_name.clone(),
            stmt.table.clone(),
            stmt.column.clone(),
            stmt.unique,
        ))?;
        self.db.flush()?;
        Ok(QueryResult::definition(format!(
            "Index '{}' created",
            stmt.index_name
        )))
    }

    fn execute_drop_index(&mut self, stmt: &DropIndexStmt) -> Result<QueryResult> {
        self.db.drop_index(&stmt.index_name)?;
        self.db.flush()?;
        Ok(QueryResult::definition(format!(
            "Index '{}' dropped",
            stmt.index_name
        )))
    }

    fn execute_truncate(&mut self, stmt: &TruncateStmt) -> Result<QueryResult> {
        self.db.truncate_table(&stmt.table)?;
        self.db.flush()?;
        Ok(QueryResult::definition(format!(
            "Table '{}' truncated",
            stmt.table
        )))
    }

    fn execute_show_tables(&mut self) -> Result<QueryResult> {
        let rows = self
            .db
            .tables()
            .into_iter()
            .map(|name| vec![Value::Text(name)])
            .collect();
        Ok(QueryResult::rows_result(
            vec!["table_name".to_string()],
            rows,
        ))
    }

    fn execute_describe(&mut self, table: &str) -> Result<QueryResult> {
        let schema = self.db.schema(table)?;

        let rows = schema
            .columns
            .iter()
            .map(|col| {
                let key = if col.primary_key {
                    "PRI"
                } else if col.unique {
                    "UNI"
                } else {
                    ""
                };
                vec![
                    Value::Text(col.name.clone()),
                    Value::Text(col.col_type.to_string()),
                    Value::Text(if col.not_null { "NO" } else { "YES" }.to_string()),
                    Value::Text(key.to_string()),
                    col.default.clone().unwrap_or(Value::Null),
                ]
            })
            .collect();

        Ok(QueryResult::rows_result(
            vec![
                "column_name".to_string(),
                "data_type".to_string(),
                "nullable".to_string(),
                "key".to_string(),
                "default".to_string(),
            ],
            rows,
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// (display name, row key) pairs for `*` projection
fn base_columns_for(
    schema: &TableSchema,
    alias: &str,
    qualified_display: bool,
) -> Vec<(String, String)> {
    schema
        .columns
        .iter()
        .map(|col| {
            let key = format!("{}.{}", alias, col.name);
            let display = if qualified_display {
                key.clone()
            } else {
                col.name.clone()
            };
            (display, key)
        })
        .collect()
}

/// Check an expression evaluated per group: every bare column outside an
/// aggregate call must be a group key
fn validate_group_expr(expr: &Expr, group_cols: &[String]) -> Result<()> {
    if expr.is_aggregate() {
        return Ok(()); // aggregate arguments may reference any column
    }

    match expr {
        Expr::Column(name) => {
            if group_cols.iter().any(|g| g.eq_ignore_ascii_case(name)) {
                Ok(())
            } else {
                Err(DbError::Schema(format!(
                    "Column '{}' must appear in GROUP BY or inside an aggregate",
                    name
                )))
            }
        }
        Expr::Literal(_) | Expr::Wildcard => Ok(()),
        Expr::BinaryOp { left, right, .. } => {
            validate_group_expr(left, group_cols)?;
            validate_group_expr(right, group_cols)
        }
        Expr::UnaryOp { expr, .. } => validate_group_expr(expr, group_cols),
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                validate_group_expr(arg, group_cols)?;
            }
            Ok(())
        }
        Expr::In { expr, list, .. } => {
            validate_group_expr(expr, group_cols)?;
            for item in list {
                validate_group_expr(item, group_cols)?;
            }
            Ok(())
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            validate_group_expr(expr, group_cols)?;
            validate_group_expr(low, group_cols)?;
            validate_group_expr(high, group_cols)
        }
        Expr::Like { expr, pattern, .. } => {
            validate_group_expr(expr, group_cols)?;
            validate_group_expr(pattern, group_cols)
        }
        Expr::IsNull { expr, .. } => validate_group_expr(expr, group_cols),
    }
}

fn collect_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// Match a conjunct against the indexable shapes, resolving the column to
/// the scanned table's alias
fn extract_indexable(expr: &Expr, alias: &str) -> Option<IndexableCondition> {
    let column_of = |e: &Expr| -> Option<String> {
        let Expr::Column(name) = e else { return None };
        match name.split_once('.') {
            Some((qualifier, column)) => {
                if qualifier.eq_ignore_ascii_case(alias) {
                    Some(column.to_string())
                } else {
                    None
                }
            }
            None => Some(name.clone()),
        }
    };
    let literal_of = |e: &Expr| -> Option<Value> {
        match e {
            Expr::Literal(v) if !v.is_null() => Some(v.clone()),
            _ => None,
        }
    };

    match expr {
        Expr::BinaryOp { left, op, right } => {
            let (column, value, op) = if let (Some(c), Some(v)) = (column_of(left), literal_of(right))
            {
                (c, v, *op)
            } else if let (Some(c), Some(v)) = (column_of(right), literal_of(left)) {
                // Flip the comparison when the literal is on the left
                let flipped = match op {
                    BinaryOperator::Lt => BinaryOperator::Gt,
                    BinaryOperator::Le => BinaryOperator::Ge,
                    BinaryOperator::Gt => BinaryOperator::Lt,
                    BinaryOperator::Ge => BinaryOperator::Le,
                    other => *other,
                };
                (c, v, flipped)
            } else {
                return None;
            };

            match op {
                BinaryOperator::Eq => Some(IndexableCondition::Point { column, value }),
                BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => {
                    Some(IndexableCondition::OpenRange { column, value, op })
                }
                _ => None,
            }
        }

        Expr::In {
            expr,
            list,
            negated: false,
        } => {
            let column = column_of(expr)?;
            let values: Option<Vec<Value>> = list.iter().map(literal_of).collect();
            Some(IndexableCondition::Points {
                column,
                values: values?,
            })
        }

        Expr::Between {
            expr,
            low,
            high,
            negated: false,
        } => {
            let column = column_of(expr)?;
            Some(IndexableCondition::Range {
                column,
                low: literal_of(low)?,
                high: literal_of(high)?,
            })
        }

        _ => None,
    }
}

/// ORDER BY comparison: nulls sort first under ASC and last under DESC
fn compare_sort_keys(
    a: &[Value],
    b: &[Value],
    order_by: &[OrderByExpr],
) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    for (i, item) in order_by.iter().enumerate() {
        let (va, vb) = (&a[i], &b[i]);
        let ord = match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                if item.asc {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, true) => {
                if item.asc {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, false) => {
                let natural = va.compare(vb).ok().flatten().unwrap_or(Ordering::Equal);
                if item.asc {
                    natural
                } else {
                    natural.reverse()
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// DISTINCT: deduplicate projected tuples, null equal to null, keeping
/// first appearance
fn dedup_rows(rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key = format!("{:?}", row);
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}
