use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

impl OrderKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Desc,
        }
    }
}

/// Ordered list of sort keys; earlier keys win, later keys break ties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Order(pub Vec<OrderKey>);

impl Order {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn by(key: OrderKey) -> Self {
        Self(vec![key])
    }

    pub fn then(mut self, key: OrderKey) -> Self {
        self.0.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }
}

impl From<Vec<OrderKey>> for Order {
    fn from(keys: Vec<OrderKey>) -> Self {
        Self(keys)
    }
}

/// Signed-token form, e.g. `+count,-image`.
impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .0
            .iter()
            .map(|k| match k.dir {
                SortDir::Asc => format!("+{}", k.field),
                SortDir::Desc => format!("-{}", k.field),
            })
            .collect();
        f.write_str(&tokens.join(","))
    }
}
