use service_engine::response::JsonValue;
use service_engine::service::Completion;
use service_engine::service::Invocation;
use service_engine::service::MethodInfo;
use service_engine::Engine;
use service_engine::ExecutionResponse;
use service_engine::ResolvedValue;
use service_engine::ServiceObject;
use service_schema::name;
use service_schema::schema::EnumValue;
use service_schema::schema::Field;
use service_schema::schema::InputValue;
use service_schema::schema::ScalarType;
use service_schema::schema::Schema;
use service_schema::schema::TypeKind;
use service_schema::schema::TypeRef;
use service_schema::Name;
use std::collections::HashMap;
use std::sync::Arc;

type Handler = Box<dyn Fn(Invocation, Completion) + Send + Sync>;

/// A service object answering each method with a closure
pub struct TestObject {
    type_name: &'static str,
    isolated: bool,
    methods: Vec<MethodInfo>,
    handlers: HashMap<String, Handler>,
}

impl TestObject {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            isolated: true,
            methods: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn non_isolated(mut self) -> Self {
        self.isolated = false;
        self
    }

    pub fn method(
        mut self,
        method: MethodInfo,
        handler: impl Fn(Invocation, Completion) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(method.name.clone(), Box::new(handler));
        self.methods.push(method);
        self
    }

    pub fn value(
        self,
        method: MethodInfo,
        value: impl Fn() -> ResolvedValue + Send + Sync + 'static,
    ) -> Self {
        self.method(method, move |_, completion| completion.success(value()))
    }
}

impl ServiceObject for TestObject {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn isolated(&self) -> bool {
        self.isolated
    }

    fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    fn invoke(&self, call: Invocation, completion: Completion) {
        match self.handlers.get(call.method()) {
            Some(handler) => handler(call, completion),
            None => completion.failure(format!("no handler for `{}`", call.method())),
        }
    }
}

pub fn book(title: impl Into<String>, year: i64) -> TestObject {
    let title: String = title.into();
    TestObject::new("Book")
        .value(MethodInfo::get(["title"]), move || ResolvedValue::leaf(title.clone()))
        .value(MethodInfo::get(["year"]), move || ResolvedValue::leaf(year))
}

pub fn non_null(name: Name) -> TypeRef {
    TypeRef::named(name).non_null()
}

fn object(schema: &mut Schema, name: Name, fields: impl IntoIterator<Item = Field>) {
    let ty = schema.add_type(name, TypeKind::Object, None);
    for field in fields {
        ty.add_field(field)
    }
}

/// ```graphql
/// type Query {
///   greeting: String!
///   book(id: Int!): Book
///   books: [Book!]!
///   shelf: Shelf!
///   profile: Profile
///   search(term: String!): [String!]
///   item: Item
///   genre: Genre
///   count: Int
///   lost: String
///   slow: String
///   missing: String
/// }
/// type Mutation { addBook(title: String!): Book!  first: Int!  second: Int! }
/// type Subscription { ticks: Int!  releases: Book! }
/// type Book { title: String!  year: Int  author: String }
/// type Shelf { size: Int!  top: Book }
/// type Profile { name: String!  scores(key: String!): Int }
/// union Item = Book | Profile
/// enum Genre { FICTION HISTORY }
/// ```
pub fn library_schema() -> Schema {
    let mut schema = Schema::new(None, false);
    for scalar in ScalarType::ALL {
        schema.add_scalar(scalar);
    }
    object(
        &mut schema,
        name!("Query"),
        [
            Field::new(name!("greeting"), non_null(name!("String"))),
            Field::new(name!("book"), TypeRef::named(name!("Book")))
                .argument(InputValue::new(name!("id"), non_null(name!("Int")))),
            Field::new(name!("books"), TypeRef::list(non_null(name!("Book"))).non_null()),
            Field::new(name!("shelf"), non_null(name!("Shelf"))),
            Field::new(name!("profile"), TypeRef::named(name!("Profile"))),
            Field::new(name!("search"), TypeRef::list(non_null(name!("String"))))
                .argument(InputValue::new(name!("term"), non_null(name!("String")))),
            Field::new(name!("item"), TypeRef::named(name!("Item"))),
            Field::new(name!("genre"), TypeRef::named(name!("Genre"))),
            Field::new(name!("count"), TypeRef::named(name!("Int"))),
            Field::new(name!("lost"), TypeRef::named(name!("String"))),
            Field::new(name!("slow"), TypeRef::named(name!("String"))),
            Field::new(name!("missing"), TypeRef::named(name!("String"))),
        ],
    );
    object(
        &mut schema,
        name!("Mutation"),
        [
            Field::new(name!("addBook"), non_null(name!("Book")))
                .argument(InputValue::new(name!("title"), non_null(name!("String")))),
            Field::new(name!("first"), non_null(name!("Int"))),
            Field::new(name!("second"), non_null(name!("Int"))),
        ],
    );
    object(
        &mut schema,
        name!("Subscription"),
        [
            Field::new(name!("ticks"), non_null(name!("Int"))),
            Field::new(name!("releases"), non_null(name!("Book"))),
        ],
    );
    object(
        &mut schema,
        name!("Book"),
        [
            Field::new(name!("title"), non_null(name!("String"))),
            Field::new(name!("year"), TypeRef::named(name!("Int"))),
            Field::new(name!("author"), TypeRef::named(name!("String"))),
        ],
    );
    object(
        &mut schema,
        name!("Shelf"),
        [
            Field::new(name!("size"), non_null(name!("Int"))),
            Field::new(name!("top"), TypeRef::named(name!("Book"))),
        ],
    );
    object(
        &mut schema,
        name!("Profile"),
        [
            Field::new(name!("name"), non_null(name!("String"))),
            Field::new(name!("scores"), TypeRef::named(name!("Int")))
                .argument(InputValue::new(name!("key"), non_null(name!("String")))),
        ],
    );
    let item = schema.add_type(name!("Item"), TypeKind::Union, None);
    item.add_possible_type(name!("Book"));
    item.add_possible_type(name!("Profile"));
    let genre = schema.add_type(name!("Genre"), TypeKind::Enum, None);
    genre.add_enum_value(EnumValue::new(name!("FICTION")));
    genre.add_enum_value(EnumValue::new(name!("HISTORY")));
    schema.query_type = Some(name!("Query"));
    schema.mutation_type = Some(name!("Mutation"));
    schema.subscription_type = Some(name!("Subscription"));
    schema
}

/// Logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine(root: TestObject) -> Engine {
    init_tracing();
    Engine::from_schema(library_schema(), Arc::new(root))
}

pub fn json(response: &ExecutionResponse) -> serde_json::Value {
    serde_json::to_value(response).unwrap()
}

pub fn int_arg(call: &Invocation, name: &str) -> Option<i64> {
    call.arg(name).and_then(JsonValue::as_i64)
}
